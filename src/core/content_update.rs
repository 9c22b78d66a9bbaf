//! Content and anti-virus updates pushed through Panorama.
//!
//! Panorama proxies every call to the firewall named by the `target`
//! serial number, including the job-status queries issued while waiting on
//! the download and install.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::plan::{Operation, RunSummary, Sequencer, Step};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateCategory {
    /// Applications and threats content
    Content,
    /// Anti-virus signatures
    AntiVirus,
}

impl UpdateCategory {
    pub const ALL: [UpdateCategory; 2] = [Self::Content, Self::AntiVirus];

    /// Element name used in `<request>` commands.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::AntiVirus => "anti-virus",
        }
    }
}

impl fmt::Display for UpdateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// check -> download latest -> install latest, all aimed at `serial_number`.
pub fn update_plan(category: UpdateCategory, serial_number: &str) -> Vec<Step> {
    let cat = category.as_str();
    let target = Some(serial_number.to_string());

    vec![
        Step::new(
            format!("checking for latest {cat} updates..."),
            Operation::Op {
                cmd: format!("<request><{cat}><upgrade><check/></upgrade></{cat}></request>"),
                target: target.clone(),
            },
        ),
        Step::new(
            format!("downloading latest {cat} updates..."),
            Operation::Op {
                cmd: format!(
                    "<request><{cat}><upgrade><download><latest/></download></upgrade></{cat}></request>"
                ),
                target: target.clone(),
            },
        )
        .awaiting_job(),
        Step::new(
            format!("installing latest {cat} updates..."),
            Operation::Op {
                cmd: format!(
                    "<request><{cat}><upgrade><install><version>latest</version></install></upgrade></{cat}></request>"
                ),
                target,
            },
        )
        .awaiting_job(),
    ]
}

/// Run one category's update against the firewall behind `serial_number`.
pub async fn update(
    sequencer: &Sequencer<'_>,
    category: UpdateCategory,
    serial_number: &str,
) -> Result<RunSummary> {
    tracing::info!(category = %category, target = %serial_number, "Updating content");
    sequencer.run(&update_plan(category, serial_number)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_plan_shape() {
        let plan = update_plan(UpdateCategory::AntiVirus, "0011");
        assert_eq!(plan.len(), 3);
        assert!(!plan[0].await_job);
        assert!(plan[1].await_job);
        assert!(plan[2].await_job);

        for step in &plan {
            let Operation::Op { cmd, target } = &step.operation else {
                panic!("expected op");
            };
            assert_eq!(target.as_deref(), Some("0011"));
            assert!(cmd.starts_with("<request><anti-virus><upgrade>"));
        }
        assert_eq!(plan[1].description, "downloading latest anti-virus updates...");
    }

    #[test]
    fn test_category_names() {
        assert_eq!(UpdateCategory::Content.to_string(), "content");
        assert_eq!(UpdateCategory::AntiVirus.to_string(), "anti-virus");
        assert_eq!(
            UpdateCategory::ALL,
            [UpdateCategory::Content, UpdateCategory::AntiVirus]
        );
    }
}
