//! The fixed set of watched document topics.
//!
//! Every topic is an explicit record rather than a string-keyed mapping;
//! the CLI selects which of them run.

use reqwest::Url;

use crate::config::SiteUrls;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low,
    Normal,
    Critical,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Errata,
    Changelog,
    Events,
    Current,
    Innovations,
    Hackathons,
    Packages,
}

#[derive(Debug, Clone)]
pub struct Check {
    pub topic: Topic,
    pub url: Url,
    pub title: &'static str,
    pub urgency: Urgency,
    /// Fixed notification body; when absent the document diff is the body.
    pub body: Option<String>,
}

/// All watched document topics with their URLs, titles and urgency levels.
pub fn document_checks(site: &SiteUrls, arch: &str) -> Vec<Check> {
    vec![
        Check {
            topic: Topic::Errata,
            url: site.errata.clone(),
            title: "New OpenBSD security patch.",
            urgency: Urgency::Normal,
            body: None,
        },
        Check {
            topic: Topic::Changelog,
            url: site.changelog.clone(),
            title: "New OpenBSD CVS commits.",
            urgency: Urgency::Low,
            body: None,
        },
        Check {
            topic: Topic::Events,
            url: site.events.clone(),
            title: "New OpenBSD event.",
            urgency: Urgency::Normal,
            body: None,
        },
        Check {
            topic: Topic::Current,
            url: site.current_faq.clone(),
            title: "OpenBSD FAQ's following current update.",
            urgency: Urgency::Critical,
            body: None,
        },
        Check {
            topic: Topic::Innovations,
            url: site.innovations.clone(),
            title: "New OpenBSD innovations.",
            urgency: Urgency::Normal,
            body: None,
        },
        Check {
            topic: Topic::Hackathons,
            url: site.hackathons.clone(),
            title: "OpenBSD hackathons update.",
            urgency: Urgency::Normal,
            body: None,
        },
        Check {
            topic: Topic::Packages,
            url: site.packages_index.clone(),
            title: "OpenBSD package set",
            urgency: Urgency::Critical,
            body: Some(format!("New {arch} package set available.")),
        },
    ]
}
