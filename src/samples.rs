//! Built-in sample datasets.
//!
//! Served when a collection has never been persisted (first run) or when the
//! stored document is unreadable. Dates are relative to the load time so the
//! seeded workspace always looks current.

use chrono::{DateTime, Duration, Utc};

use crate::types::{
    Customer, CustomerStatus, Deal, DealStage, Interaction, InteractionType, Priority, Project,
    Status, Task,
};

pub fn sample_projects(now: DateTime<Utc>) -> Vec<Project> {
    vec![
        Project {
            id: "project-1".to_string(),
            name: "Website Redesign".to_string(),
            description: "Complete overhaul of the company website".to_string(),
            color: "#6366f1".to_string(),
            created_at: now,
            updated_at: now,
        },
        Project {
            id: "project-2".to_string(),
            name: "Mobile App".to_string(),
            description: "iOS and Android mobile application".to_string(),
            color: "#10b981".to_string(),
            created_at: now,
            updated_at: now,
        },
    ]
}

pub fn sample_tasks(now: DateTime<Utc>) -> Vec<Task> {
    vec![
        Task {
            id: "task-1".to_string(),
            title: "Design homepage mockup".to_string(),
            description: "Create initial design concepts for the new homepage".to_string(),
            status: Status::InProgress,
            priority: Priority::High,
            due_date: Some(now + Duration::days(2)),
            project_id: Some("project-1".to_string()),
            category: "Design".to_string(),
            tags: vec!["ui".to_string(), "homepage".to_string()],
            created_at: now,
            updated_at: now,
            completed_at: None,
        },
        Task {
            id: "task-2".to_string(),
            title: "Setup project repository".to_string(),
            description: "Initialize Git repo and configure CI/CD".to_string(),
            status: Status::Done,
            priority: Priority::Medium,
            due_date: Some(now - Duration::days(1)),
            project_id: Some("project-2".to_string()),
            category: "Development".to_string(),
            tags: vec!["devops".to_string(), "setup".to_string()],
            created_at: now,
            updated_at: now,
            completed_at: Some(now),
        },
        Task {
            id: "task-3".to_string(),
            title: "User research interviews".to_string(),
            description: "Conduct interviews with 5 target users".to_string(),
            status: Status::Todo,
            priority: Priority::Urgent,
            due_date: Some(now + Duration::days(1)),
            project_id: Some("project-1".to_string()),
            category: "Research".to_string(),
            tags: vec!["research".to_string(), "users".to_string()],
            created_at: now,
            updated_at: now,
            completed_at: None,
        },
        Task {
            id: "task-4".to_string(),
            title: "API documentation".to_string(),
            description: "Document all REST API endpoints".to_string(),
            status: Status::Todo,
            priority: Priority::Low,
            due_date: Some(now + Duration::days(7)),
            project_id: Some("project-2".to_string()),
            category: "Documentation".to_string(),
            tags: vec!["docs".to_string(), "api".to_string()],
            created_at: now,
            updated_at: now,
            completed_at: None,
        },
    ]
}

pub fn sample_customers(now: DateTime<Utc>) -> Vec<Customer> {
    vec![
        Customer {
            id: "customer-1".to_string(),
            name: "Dana Whitfield".to_string(),
            company: "Whitfield Consulting".to_string(),
            email: "dana@whitfieldconsulting.com".to_string(),
            phone: "(555) 010-0101".to_string(),
            status: CustomerStatus::Active,
            tags: vec!["Retainer".to_string(), "Referral".to_string()],
            address: "14 Harbor Lane, Portland, OR".to_string(),
            notes: "Monthly retainer since last spring. Prefers email.".to_string(),
            created_at: now - Duration::days(90),
            updated_at: now - Duration::days(30),
        },
        Customer {
            id: "customer-2".to_string(),
            name: "Marcus Reed".to_string(),
            company: "Reed & Sons Manufacturing".to_string(),
            email: "marcus@reedandsons.com".to_string(),
            phone: "(555) 010-0102".to_string(),
            status: CustomerStatus::Active,
            tags: vec!["Enterprise".to_string()],
            address: "900 Industrial Pkwy, Portland, OR".to_string(),
            notes: "Three active workstreams. Quarterly business reviews.".to_string(),
            created_at: now - Duration::days(180),
            updated_at: now - Duration::days(14),
        },
        Customer {
            id: "customer-3".to_string(),
            name: "Priya Natarajan".to_string(),
            company: String::new(),
            email: "priya.n@fastmail.com".to_string(),
            phone: "(555) 010-0103".to_string(),
            status: CustomerStatus::Prospect,
            tags: vec!["Inbound".to_string()],
            address: String::new(),
            notes: "Asked for a proposal after the webinar. Budget unclear.".to_string(),
            created_at: now - Duration::days(7),
            updated_at: now - Duration::days(2),
        },
    ]
}

pub fn sample_deals(now: DateTime<Utc>) -> Vec<Deal> {
    vec![
        Deal {
            id: "deal-1".to_string(),
            customer_id: "customer-2".to_string(),
            title: "Annual support renewal".to_string(),
            value: 24_000.0,
            stage: DealStage::Negotiation,
            expected_close: Some((now + Duration::days(14)).date_naive()),
            notes: "Renewal plus two added seats.".to_string(),
            created_at: now - Duration::days(40),
            updated_at: now - Duration::days(3),
        },
        Deal {
            id: "deal-2".to_string(),
            customer_id: "customer-3".to_string(),
            title: "Onboarding project".to_string(),
            value: 8_500.0,
            stage: DealStage::Proposal,
            expected_close: Some((now + Duration::days(21)).date_naive()),
            notes: "Proposal sent, waiting on budget approval.".to_string(),
            created_at: now - Duration::days(6),
            updated_at: now - Duration::days(1),
        },
        Deal {
            id: "deal-3".to_string(),
            customer_id: "customer-1".to_string(),
            title: "Q1 retainer extension".to_string(),
            value: 12_000.0,
            stage: DealStage::ClosedWon,
            expected_close: Some((now - Duration::days(10)).date_naive()),
            notes: String::new(),
            created_at: now - Duration::days(60),
            updated_at: now - Duration::days(10),
        },
    ]
}

pub fn sample_interactions(now: DateTime<Utc>) -> Vec<Interaction> {
    vec![
        Interaction {
            id: "interaction-1".to_string(),
            customer_id: "customer-1".to_string(),
            interaction_type: InteractionType::Call,
            date: now - Duration::days(30),
            notes: "Monthly check-in. Scope unchanged for next cycle.".to_string(),
            follow_up_date: None,
            created_at: now - Duration::days(30),
        },
        Interaction {
            id: "interaction-2".to_string(),
            customer_id: "customer-3".to_string(),
            interaction_type: InteractionType::Meeting,
            date: now - Duration::days(7),
            notes: "Discovery session. Walked through current workflow pain points.".to_string(),
            follow_up_date: Some((now + Duration::days(3)).date_naive()),
            created_at: now - Duration::days(7),
        },
        Interaction {
            id: "interaction-3".to_string(),
            customer_id: "customer-2".to_string(),
            interaction_type: InteractionType::Email,
            date: now - Duration::days(2),
            notes: "Sent renewal terms and updated seat pricing.".to_string(),
            follow_up_date: Some((now + Duration::days(5)).date_naive()),
            created_at: now - Duration::days(2),
        },
    ]
}
