//! Vinted's upload form (vinted.pl, Polish labels, PLN prices).

use super::{Action, FlowInput, PlannedStep, Step, form_checks, option_target};
use crate::draft::ListingDraft;
use crate::models::Marketplace;
use crate::resolver::{Locator, Target};

pub fn login_probe() -> Target {
    Target::new(
        "vinted account menu",
        vec![
            Locator::css("[data-testid=\"header--user-menu\"]"),
            Locator::attr("data-testid", "header-user-avatar"),
            Locator::css("#user-menu-button"),
        ],
    )
}

fn photo_input() -> Target {
    Target::new(
        "vinted photo input",
        vec![
            Locator::css("[data-testid=\"add-photos-input\"]"),
            Locator::css("input[type=\"file\"][accept*=\"image\"]"),
            Locator::css("input[type=\"file\"]"),
        ],
    )
    .allow_hidden()
}

fn photo_thumbnail() -> Target {
    Target::new(
        "vinted photo thumbnail",
        vec![
            Locator::css("[data-testid=\"media-select-photo\"]"),
            Locator::css("[data-testid^=\"image-\"] img"),
            Locator::css("img[src^=\"blob:\"]"),
        ],
    )
}

fn title_input() -> Target {
    Target::new(
        "title",
        vec![
            Locator::css("[data-testid=\"title--input\"]"),
            Locator::css("input#title"),
            Locator::attr("name", "title"),
            Locator::css("input[placeholder*=\"np.\"]"),
        ],
    )
}

fn description_input() -> Target {
    Target::new(
        "description",
        vec![
            Locator::css("[data-testid=\"description--input\"]"),
            Locator::css("textarea#description"),
            Locator::attr("name", "description"),
            Locator::css("textarea"),
        ],
    )
}

fn category_trigger() -> Target {
    Target::new(
        "category dropdown",
        vec![
            Locator::css("[data-testid=\"catalog-select-dropdown-input\"]"),
            Locator::css("input[name=\"category\"]"),
            Locator::role("combobox", Some("Kategoria")),
            Locator::text("Wybierz kategorię"),
        ],
    )
}

fn brand_input() -> Target {
    Target::new(
        "brand",
        vec![
            Locator::css("[data-testid=\"brand-select-dropdown-input\"]"),
            Locator::css("input[name=\"brand\"]"),
            Locator::role("combobox", Some("Marka")),
        ],
    )
}

fn size_trigger() -> Target {
    Target::new(
        "size dropdown",
        vec![
            Locator::css("[data-testid=\"size-select-dropdown-input\"]"),
            Locator::css("input[name=\"size\"]"),
            Locator::role("combobox", Some("Rozmiar")),
        ],
    )
}

fn color_trigger() -> Target {
    Target::new(
        "color dropdown",
        vec![
            Locator::css("[data-testid=\"color-select-dropdown-input\"]"),
            Locator::css("input[name=\"color\"]"),
            Locator::role("combobox", Some("Kolor")),
        ],
    )
}

fn condition_trigger() -> Target {
    Target::new(
        "condition dropdown",
        vec![
            Locator::css("[data-testid=\"status-select-dropdown-input\"]"),
            Locator::css("input[name=\"status\"]"),
            Locator::role("combobox", Some("Stan")),
        ],
    )
}

fn price_input() -> Target {
    Target::new(
        "price",
        vec![
            Locator::css("[data-testid=\"price-input--input\"]"),
            Locator::css("input#price"),
            Locator::attr("name", "price"),
        ],
    )
}

fn submit_button() -> Target {
    Target::new(
        "vinted submit",
        vec![
            Locator::css("[data-testid=\"upload-form-save-button\"]"),
            Locator::css("button[type=\"submit\"]"),
            Locator::role("button", Some("Dodaj")),
            Locator::text("Dodaj"),
        ],
    )
}

fn success_marker() -> Target {
    Target::new(
        "vinted item page",
        vec![
            Locator::css("[data-testid=\"item-upload-success\"]"),
            Locator::css("[data-testid=\"item-page-summary-plugin\"]"),
        ],
    )
}

pub fn plan(draft: &ListingDraft, input: &FlowInput<'_>) -> Vec<PlannedStep> {
    let marketplace = Marketplace::Vinted;
    let path = draft.category_path;
    let mut steps = vec![
        PlannedStep::required(
            Step::Navigate,
            vec![Action::Navigate {
                url: marketplace.create_listing_url().to_string(),
                ready: Target::new(
                    "vinted upload form",
                    vec![
                        Locator::css("[data-testid=\"title--input\"]"),
                        Locator::css("[data-testid=\"add-photos-input\"]"),
                        Locator::css("form"),
                    ],
                )
                .allow_hidden(),
            }],
        ),
        PlannedStep::required(
            Step::SelectCategory,
            vec![Action::Path {
                trigger: category_trigger(),
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
                field: brand_input(),
                query: draft.brand.clone(),
                option: option_target("brand suggestion", &draft.brand).with_keyboard_fallback(),
            }],
        ),
    ];

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

    // The style descriptor only travels in the title and description here.
    steps.push(PlannedStep::skipped(Step::SelectStyle, "no style field on vinted"));

    steps.push(PlannedStep::required(
        Step::FillPrice,
        vec![Action::Fill {
            target: price_input(),
            value: input.price.clone(),
        }],
    ));

    steps.push(PlannedStep::skipped(
        Step::FillCountryOfOrigin,
        "no country of origin field on vinted",
    ));

    steps.push(PlannedStep::required(
        Step::UploadPhotos,
        vec![Action::Upload {
            input: photo_input(),
            files: input.photos.to_vec(),
            done: Some(photo_thumbnail()),
        }],
    ));

    let checks = form_checks(&steps);
    steps.push(PlannedStep::optional(Step::Verify, vec![Action::Verify(checks)]));

    steps.push(PlannedStep::required(
        Step::Submit,
        vec![Action::Confirm {
            button: submit_button(),
            leave_url: marketplace.create_listing_url().to_string(),
            success: success_marker(),
        }],
    ));
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::UiPage;
    use crate::browser::fake::{FakeAction, FakePage};
    use crate::config::TimingConfig;
    use crate::draft::{Auxiliary, build_draft};
    use crate::executor::{Executor, StepPolicy};
    use crate::models::Advertisement;
    use crate::pipeline::RunLog;
    use std::path::PathBuf;

    fn fishbone() -> Advertisement {
        Advertisement {
            id: 42,
            brand: "Fishbone".into(),
            category: "Spodnie z szerokimi nogawkami".into(),
            size: "48|W31".into(),
            condition: "dobry".into(),
            price: Some("120".into()),
            photos: vec!["https://cdn.example/1.jpg".into()],
            ..Default::default()
        }
    }

    fn input(photos: &[PathBuf]) -> FlowInput<'_> {
        FlowInput {
            photos,
            price: "120".into(),
            ..FlowInput::default()
        }
    }

    #[test]
    fn plan_follows_the_fixed_step_order() {
        let draft = build_draft(&fishbone(), Marketplace::Vinted, &Auxiliary::Unavailable);
        let photos = vec![PathBuf::from("/tmp/01.jpg")];
        let steps = plan(&draft, &input(&photos));
        let order: Vec<Step> = steps.iter().map(|s| s.step).collect();
        assert_eq!(order, Step::ORDER.to_vec());
    }

    #[test]
    fn required_steps_match_the_draft() {
        let draft = build_draft(&fishbone(), Marketplace::Vinted, &Auxiliary::Unavailable);
        let steps = plan(&draft, &input(&[]));
        let policy = |step: Step| {
            steps
                .iter()
                .find(|s| s.step == step)
                .map(|s| (s.policy, s.skip_reason.is_some()))
        };
        assert_eq!(policy(Step::SelectCategory), Some((StepPolicy::Required, false)));
        assert_eq!(policy(Step::SelectSize), Some((StepPolicy::Required, false)));
        assert_eq!(policy(Step::UploadPhotos), Some((StepPolicy::Required, false)));
        assert_eq!(policy(Step::SelectStyle), Some((StepPolicy::Optional, true)));

        let size = steps.iter().find(|s| s.step == Step::SelectSize).expect("size");
        assert!(matches!(
            &size.actions[0],
            Action::Choose { expected, .. } if expected == "W31"
        ));
    }

    #[test]
    fn verification_covers_every_typed_field() {
        let draft = build_draft(&fishbone(), Marketplace::Vinted, &Auxiliary::Unavailable);
        let steps = plan(&draft, &input(&[]));
        let verify = steps.iter().find(|s| s.step == Step::Verify).expect("verify");
        let Action::Verify(checks) = &verify.actions[0] else {
            panic!("verify action expected");
        };
        let fields: Vec<(&str, &str)> = checks
            .iter()
            .map(|c| (c.field, c.expected.as_str()))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("category dropdown", draft.category_path.subcategory),
                ("brand", "Fishbone"),
                ("size dropdown", "W31"),
                ("title", draft.title.as_str()),
                ("condition dropdown", draft.condition.label(Marketplace::Vinted)),
                ("description", draft.description.as_str()),
                ("price", "120"),
            ]
        );
    }

    #[test]
    fn declared_colour_is_verified_with_the_other_dropdowns() {
        let mut ad = fishbone();
        ad.color = Some("granatowe".into());
        let draft = build_draft(&ad, Marketplace::Vinted, &Auxiliary::Unavailable);
        let steps = plan(&draft, &input(&[]));
        let verify = steps.iter().find(|s| s.step == Step::Verify).expect("verify");
        let Action::Verify(checks) = &verify.actions[0] else {
            panic!("verify action expected");
        };
        let color = checks
            .iter()
            .find(|c| c.field == "color dropdown")
            .expect("colour check");
        assert_eq!(color.expected, "Granatowy");
    }

    #[tokio::test]
    async fn full_flow_runs_against_a_permissive_page() {
        let page = FakePage::permissive();
        let submit = page.add(&["[data-testid=\"upload-form-save-button\"]"]);
        page.navigate_on_click(submit, "https://www.vinted.pl/items/555");
        let draft = build_draft(&fishbone(), Marketplace::Vinted, &Auxiliary::Unavailable);
        let photos = vec![PathBuf::from("/tmp/01.jpg")];
        let steps = plan(&draft, &input(&photos));

        let timing = TimingConfig::instant();
        let log = RunLog::new(Marketplace::Vinted);
        let done = Executor::new(&page, &timing, &log)
            .execute(draft.advertisement_id, &steps)
            .await
            .expect("flow completes");

        assert!(done.complete, "warnings: {:?}", done.warnings);
        assert_eq!(done.reports.len(), Step::ORDER.len());
        assert!(
            page.actions()
                .iter()
                .any(|action| matches!(action, FakeAction::Upload(_, files) if files == &photos))
        );
        assert_eq!(
            page.current_url().await.expect("url"),
            "https://www.vinted.pl/items/555"
        );
    }
}
