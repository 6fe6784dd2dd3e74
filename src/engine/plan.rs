use crate::domain::{MilestoneStatus, MilestoneType, NewMilestone, TimeMs};

/// Days after order creation at which each planned milestone falls due.
const PLANNED_OFFSET_DAYS: [i64; 6] = [1, 3, 7, 14, 21, 28];
const FALLBACK_OFFSET_DAYS: i64 = 30;

struct Template {
    milestone_type: MilestoneType,
    title: &'static str,
    description: &'static str,
    estimated_minutes: i64,
}

fn project_specific(project_type: &str) -> [Template; 2] {
    match project_type {
        "MOBILE_APP" => [
            Template {
                milestone_type: MilestoneType::DevelopmentStart,
                title: "App Development",
                description: "Develop mobile application",
                estimated_minutes: 2880,
            },
            Template {
                milestone_type: MilestoneType::TestingStart,
                title: "App Testing",
                description: "Test app functionality and performance",
                estimated_minutes: 480,
            },
        ],
        "WEB_APP" => [
            Template {
                milestone_type: MilestoneType::DevelopmentStart,
                title: "Web Development",
                description: "Develop web application",
                estimated_minutes: 2400,
            },
            Template {
                milestone_type: MilestoneType::TestingStart,
                title: "Web Testing",
                description: "Test web app functionality",
                estimated_minutes: 360,
            },
        ],
        _ => [
            Template {
                milestone_type: MilestoneType::DevelopmentStart,
                title: "Development",
                description: "Develop the requested solution",
                estimated_minutes: 1920,
            },
            Template {
                milestone_type: MilestoneType::TestingStart,
                title: "Testing",
                description: "Test the developed solution",
                estimated_minutes: 240,
            },
        ],
    }
}

/// Planned due date of the `index`-th milestone of an order.
pub fn planned_date(order_created_at: TimeMs, index: usize) -> TimeMs {
    let days = PLANNED_OFFSET_DAYS
        .get(index)
        .copied()
        .unwrap_or(FALLBACK_OFFSET_DAYS);
    order_created_at.plus_days(days)
}

/// Standard milestone plan for a project type.
///
/// The first milestone starts IN_PROGRESS; the rest are PENDING.
pub fn default_plan(project_type: &str, order_created_at: TimeMs) -> Vec<NewMilestone> {
    let [dev, test] = project_specific(project_type);
    let templates = [
        Template {
            milestone_type: MilestoneType::RequirementGathering,
            title: "Requirements Gathering",
            description: "Collect and analyze project requirements",
            estimated_minutes: 240,
        },
        Template {
            milestone_type: MilestoneType::DesignReview,
            title: "Design & Planning",
            description: "Create project design and development plan",
            estimated_minutes: 480,
        },
        dev,
        test,
        Template {
            milestone_type: MilestoneType::QualityCheck,
            title: "Quality Assurance",
            description: "Final quality checks and testing",
            estimated_minutes: 120,
        },
        Template {
            milestone_type: MilestoneType::FinalDelivery,
            title: "Final Delivery",
            description: "Deliver final product to client",
            estimated_minutes: 60,
        },
    ];

    templates
        .into_iter()
        .enumerate()
        .map(|(i, t)| NewMilestone {
            milestone_type: t.milestone_type,
            title: t.title.to_string(),
            description: Some(t.description.to_string()),
            status: if i == 0 {
                MilestoneStatus::InProgress
            } else {
                MilestoneStatus::Pending
            },
            planned_date: Some(planned_date(order_created_at, i)),
            estimated_duration: Some(t.estimated_minutes),
        })
        .collect()
}
