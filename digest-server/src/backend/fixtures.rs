//! Canned backend data for running the gateway without a backend

use super::models::{
    Confidence, OneTimeReportResponse, Report, ReportClaim, ReportOutlineItem, Source,
    SourceType, Subscription, SubscriptionFrequency, SubscriptionStatus, TaskStatus,
};

pub fn sources() -> Vec<Source> {
    vec![
        Source {
            id: "source-1".into(),
            title: Some("Lex Fridman Podcast".into()),
            youtube_id: "UCxxxxxx1".into(),
            source_type: SourceType::Channel,
            is_whitelisted: Some(true),
        },
        Source {
            id: "source-2".into(),
            title: Some("Fireship".into()),
            youtube_id: "UCxxxxxx2".into(),
            source_type: SourceType::Channel,
            is_whitelisted: Some(true),
        },
    ]
}

pub fn subscriptions() -> Vec<Subscription> {
    vec![
        Subscription {
            id: "sub-1".into(),
            source_id: "source-1".into(),
            frequency: SubscriptionFrequency::Weekly,
            status: SubscriptionStatus::Active,
            send_time_local: Some("09:00".into()),
        },
        Subscription {
            id: "sub-2".into(),
            source_id: "source-2".into(),
            frequency: SubscriptionFrequency::Each,
            status: SubscriptionStatus::Active,
            send_time_local: None,
        },
    ]
}

pub fn one_time_report() -> OneTimeReportResponse {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    OneTimeReportResponse {
        task_id: format!("task-{}", millis),
        status: TaskStatus::Queued,
    }
}

pub fn reports() -> Vec<Report> {
    vec![Report {
        id: "report-1".into(),
        video_title: "Introduction to Machine Learning".into(),
        tldr: Some(vec!["Key concept 1".into(), "Key concept 2".into()]),
        outline: None,
        claims: None,
        html_url: Some("#".into()),
        pdf_url: Some("#".into()),
    }]
}

pub fn report(id: &str) -> Report {
    Report {
        id: id.to_string(),
        video_title: "Sample Report".into(),
        tldr: Some(vec!["Point 1".into(), "Point 2".into(), "Point 3".into()]),
        outline: Some(vec![
            ReportOutlineItem {
                timestamp: Some("00:00".into()),
                title: Some("Introduction".into()),
                summary: Some("Overview".into()),
            },
            ReportOutlineItem {
                timestamp: Some("05:30".into()),
                title: Some("Main Content".into()),
                summary: Some("Details".into()),
            },
        ]),
        claims: Some(vec![ReportClaim {
            claim: Some("Claim 1".into()),
            evidence: Some("Evidence".into()),
            confidence: Some(Confidence::High),
        }]),
        html_url: Some("#".into()),
        pdf_url: Some("#".into()),
    }
}
