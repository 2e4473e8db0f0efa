//! Grailed's sell form (grailed.com, English labels, USD prices with an
//! optional floor price).

use super::{Action, FlowInput, PlannedStep, Step, form_checks, option_target};
use crate::draft::ListingDraft;
use crate::models::Marketplace;
use crate::resolver::{Locator, Target};

pub fn login_probe() -> Target {
    Target::new(
        "grailed account menu",
        vec![
            Locator::css("[data-testid=\"header-profile-menu\"]"),
            Locator::css("a[href^=\"/users/\"] img"),
            Locator::role("button", Some("My Account")),
        ],
    )
}

fn photo_input() -> Target {
    Target::new(
        "grailed photo input",
        vec![
            Locator::css("input[name=\"photos\"]"),
            Locator::css("input[type=\"file\"][multiple]"),
            Locator::css("input[type=\"file\"]"),
        ],
    )
    .allow_hidden()
}

fn photo_thumbnail() -> Target {
    Target::new(
        "grailed photo thumbnail",
        vec![
            Locator::css("[data-testid=\"photo-thumbnail\"]"),
            Locator::css(".PhotoUploader img"),
            Locator::css("img[src^=\"blob:\"]"),
        ],
    )
}

fn department_trigger() -> Target {
    Target::new(
        "category dropdown",
        vec![
            Locator::css("[data-testid=\"category-select\"]"),
            Locator::css("select[name=\"category\"]"),
            Locator::role("combobox", Some("Department / Category")),
            Locator::text("Department / Category"),
        ],
    )
}

fn designer_input() -> Target {
    Target::new(
        "designer",
        vec![
            Locator::css("input[name=\"designer\"]"),
            Locator::css("[data-testid=\"designer-autocomplete\"] input"),
            Locator::role("combobox", Some("Designer")),
        ],
    )
}

fn size_trigger() -> Target {
    Target::new(
        "size dropdown",
        vec![
            Locator::css("[data-testid=\"size-select\"]"),
            Locator::css("select[name=\"size\"]"),
            Locator::role("combobox", Some("Size")),
        ],
    )
}

fn title_input() -> Target {
    Target::new(
        "title",
        vec![
            Locator::css("input[name=\"title\"]"),
            Locator::css("[data-testid=\"listing-title\"] input"),
            Locator::css("input[placeholder*=\"Item Name\"]"),
        ],
    )
}

fn color_trigger() -> Target {
    Target::new(
        "color dropdown",
        vec![
            Locator::css("[data-testid=\"color-select\"]"),
            Locator::css("select[name=\"color\"]"),
            Locator::role("combobox", Some("Color")),
        ],
    )
}

fn condition_trigger() -> Target {
    Target::new(
        "condition dropdown",
        vec![
            Locator::css("[data-testid=\"condition-select\"]"),
            Locator::css("select[name=\"condition\"]"),
            Locator::role("combobox", Some("Condition")),
        ],
    )
}

fn description_input() -> Target {
    Target::new(
        "description",
        vec![
            Locator::css("textarea[name=\"description\"]"),
            Locator::css("[data-testid=\"listing-description\"] textarea"),
            Locator::css("textarea"),
        ],
    )
}

fn tags_input() -> Target {
    Target::new(
        "style tags",
        vec![
            Locator::css("input[name=\"tags\"]"),
            Locator::css("[data-testid=\"tags-input\"] input"),
            Locator::role("combobox", Some("Style")),
        ],
    )
}

fn price_input() -> Target {
    Target::new(
        "price",
        vec![
            Locator::css("input[name=\"price\"]"),
            Locator::css("[data-testid=\"price-input\"] input"),
        ],
    )
}

fn floor_price_input() -> Target {
    Target::new(
        "floor price",
        vec![
            Locator::css("input[name=\"floorPrice\"]"),
            Locator::css("input[name=\"floor_price\"]"),
            Locator::css("[data-testid=\"floor-price-input\"] input"),
        ],
    )
}

fn country_trigger() -> Target {
    Target::new(
        "country of origin dropdown",
        vec![
            Locator::css("select[name=\"countryOfOrigin\"]"),
            Locator::css("[data-testid=\"country-of-origin-select\"]"),
            Locator::role("combobox", Some("Country of Origin")),
        ],
    )
}

fn publish_button() -> Target {
    Target::new(
        "grailed publish",
        vec![
            Locator::css("[data-testid=\"publish-listing\"]"),
            Locator::css("button[type=\"submit\"]"),
            Locator::role("button", Some("Publish")),
            Locator::text("Publish"),
        ],
    )
}

fn success_marker() -> Target {
    Target::new(
        "grailed listing page",
        vec![
            Locator::css("[data-testid=\"listing-published\"]"),
            Locator::text("Your listing is live"),
        ],
    )
}

pub fn plan(draft: &ListingDraft, input: &FlowInput<'_>) -> Vec<PlannedStep> {
    let marketplace = Marketplace::Grailed;
    let path = draft.category_path;
    let mut steps = vec![
        PlannedStep::required(
            Step::Navigate,
            vec![Action::Navigate {
                url: marketplace.create_listing_url().to_string(),
                ready: Target::new(
                    "grailed sell form",
                    vec![
                        Locator::css("input[name=\"title\"]"),
                        Locator::css("input[name=\"photos\"]"),
                        Locator::css("form"),
                    ],
                )
                .allow_hidden(),
            }],
        ),
        PlannedStep::required(
            Step::SelectCategory,
            vec![Action::Path {
                trigger: department_trigger(),
                levels: vec![
                    option_target("department option", path.department),
                    option_target("category option", path.category),
                    option_target("subcategory option", path.subcategory),
                ],
                expected: path.subcategory.to_string(),
            }],
        ),
        PlannedStep::required(
            Step::SelectBrand,
            vec![Action::Search {
                field: designer_input(),
                query: draft.brand.clone(),
                option: option_target("designer suggestion", &draft.brand)
                    .with_keyboard_fallback(),
            }],
        ),
    ];

    // Size options only load once the category is set.
    let size = Action::Choose {
        trigger: size_trigger(),
        option: option_target("size option", &draft.size_label),
        expected: draft.size_label.clone(),
    };
    steps.push(if draft.requires_size() {
        PlannedStep::required(Step::SelectSize, vec![size])
    } else {
        PlannedStep::optional(Step::SelectSize, vec![size])
    });

    steps.push(PlannedStep::required(
        Step::FillTitle,
        vec![Action::Fill {
            target: title_input(),
            value: draft.title.clone(),
        }],
    ));

    let color_label = draft.color.label(marketplace);
    let color = Action::Choose {
        trigger: color_trigger(),
        option: option_target("color option", color_label).with_keyboard_fallback(),
        expected: color_label.to_string(),
    };
    steps.push(if draft.requires_color() {
        PlannedStep::required(Step::SelectColor, vec![color])
    } else if draft.color_declared {
        PlannedStep::optional(Step::SelectColor, vec![color])
    } else {
        PlannedStep::skipped(Step::SelectColor, "no colour declared")
    });

    let condition_label = draft.condition.label(marketplace);
    steps.push(PlannedStep::required(
        Step::SelectCondition,
        vec![Action::Choose {
            trigger: condition_trigger(),
            option: option_target("condition option", condition_label),
            expected: condition_label.to_string(),
        }],
    ));

    steps.push(PlannedStep::required(
        Step::FillDescription,
        vec![Action::Fill {
            target: description_input(),
            value: draft.description.clone(),
        }],
    ));

    steps.push(match &draft.style {
        Some(style) => PlannedStep::optional(
            Step::SelectStyle,
            vec![Action::Search {
                field: tags_input(),
                query: style.clone(),
                option: option_target("style suggestion", style).with_keyboard_fallback(),
            }],
        ),
        None => PlannedStep::skipped(Step::SelectStyle, "no style record"),
    });

    let mut price = vec![Action::Fill {
        target: price_input(),
        value: input.price.clone(),
    }];
    if let Some(floor) = &input.floor_price {
        price.push(Action::BestEffort(Box::new(Action::Fill {
            target: floor_price_input(),
            value: floor.clone(),
        })));
    }
    steps.push(PlannedStep::required(Step::FillPrice, price));

    steps.push(match input.country_of_origin {
        Some(country) => PlannedStep::optional(
            Step::FillCountryOfOrigin,
            vec![Action::Choose {
                trigger: country_trigger(),
                option: option_target("country option", country),
                expected: country.to_string(),
            }],
        ),
        None => PlannedStep::skipped(Step::FillCountryOfOrigin, "country of origin not configured"),
    });

    steps.push(PlannedStep::required(
        Step::UploadPhotos,
        vec![Action::Upload {
            input: photo_input(),
            files: input.photos.to_vec(),
            done: Some(photo_thumbnail()),
        }],
    ));

    // Tags clear their input once accepted, so they are not read back.
    let checks = form_checks(&steps)
        .into_iter()
        .filter(|check| check.field != "style tags")
        .collect();
    steps.push(PlannedStep::optional(Step::Verify, vec![Action::Verify(checks)]));

    steps.push(PlannedStep::required(
        Step::Submit,
        vec![Action::Confirm {
            button: publish_button(),
            leave_url: marketplace.create_listing_url().to_string(),
            success: success_marker(),
        }],
    ));
    steps
}
