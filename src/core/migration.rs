//! Move a managed firewall to another device-group / template-stack pair.
//!
//! The move is four candidate-config edits (remove before add, so the
//! operator never asks for a device to sit in two groups at once) followed
//! by three commits: Panorama itself, the template-stack push, then the
//! device-group push. The template-stack goes first so that policy objects
//! referencing template values find them on the device.

use quick_xml::escape::escape;

use super::plan::{Operation, RunSummary, Sequencer, Step, xpath_literal};
use crate::error::Result;

const PANORAMA_XPATH: &str = "/config/devices/entry[@name='localhost.localdomain']";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRequest {
    pub serial_number: String,
    pub from_device_group: String,
    pub to_device_group: String,
    pub from_template_stack: String,
    pub to_template_stack: String,
}

fn members_xpath(container: &str, name: &str) -> Result<String> {
    Ok(format!(
        "{PANORAMA_XPATH}/{container}/entry[@name='{}']/devices",
        xpath_literal(name)?
    ))
}

fn member_xpath(container: &str, name: &str, serial: &str) -> Result<String> {
    Ok(format!(
        "{}/entry[@name='{}']",
        members_xpath(container, name)?,
        xpath_literal(serial)?
    ))
}

fn member_element(serial: &str) -> String {
    format!("<entry name='{}'/>", escape(serial))
}

fn template_stack_push_cmd(serial: &str, stack: &str) -> String {
    format!(
        "<commit-all><template-stack><force-template-values>yes</force-template-values>\
         <device><member>{}</member></device><name>{}</name></template-stack></commit-all>",
        escape(serial),
        escape(stack)
    )
}

fn device_group_push_cmd(device_group: &str, serial: &str) -> String {
    format!(
        "<commit-all><shared-policy><force-template-values>yes</force-template-values>\
         <device-group><entry name='{}'><devices><entry name='{}'/></devices></entry>\
         </device-group></shared-policy></commit-all>",
        escape(device_group),
        escape(serial)
    )
}

/// Build the ordered steps of a migration.
pub fn migration_plan(req: &MigrationRequest) -> Result<Vec<Step>> {
    let sn = &req.serial_number;

    Ok(vec![
        Step::new(
            format!("removing firewall {} from dg {}...", sn, req.from_device_group),
            Operation::Delete {
                xpath: member_xpath("device-group", &req.from_device_group, sn)?,
            },
        ),
        Step::new(
            format!("adding firewall {} to dg {}...", sn, req.to_device_group),
            Operation::Set {
                xpath: members_xpath("device-group", &req.to_device_group)?,
                element: member_element(sn),
            },
        ),
        Step::new(
            format!("removing firewall {} from stack {}...", sn, req.from_template_stack),
            Operation::Delete {
                xpath: member_xpath("template-stack", &req.from_template_stack, sn)?,
            },
        ),
        Step::new(
            format!("adding firewall {} to stack {}...", sn, req.to_template_stack),
            Operation::Set {
                xpath: members_xpath("template-stack", &req.to_template_stack)?,
                element: member_element(sn),
            },
        ),
        Step::new(
            "commit to panorama",
            Operation::Commit {
                cmd: "<commit></commit>".to_string(),
            },
        )
        .awaiting_job(),
        Step::new(
            "commit for template stack",
            Operation::CommitAll {
                cmd: template_stack_push_cmd(sn, &req.to_template_stack),
            },
        )
        .awaiting_job(),
        Step::new(
            "commit for device-group",
            Operation::CommitAll {
                cmd: device_group_push_cmd(&req.to_device_group, sn),
            },
        )
        .awaiting_job(),
    ])
}

/// Move the device and push its new configuration.
pub async fn migrate(sequencer: &Sequencer<'_>, req: &MigrationRequest) -> Result<RunSummary> {
    let plan = migration_plan(req)?;
    tracing::info!(
        serial = %req.serial_number,
        to_dg = %req.to_device_group,
        to_ts = %req.to_template_stack,
        "Migrating device"
    );
    sequencer.run(&plan).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PanError;

    fn request() -> MigrationRequest {
        MigrationRequest {
            serial_number: "0011".to_string(),
            from_device_group: "DG1".to_string(),
            to_device_group: "DG2".to_string(),
            from_template_stack: "TS1".to_string(),
            to_template_stack: "TS2".to_string(),
        }
    }

    #[test]
    fn test_plan_order() {
        let plan = migration_plan(&request()).unwrap();
        let kinds: Vec<_> = plan.iter().map(|s| s.operation.kind()).collect();
        assert_eq!(
            kinds,
            vec!["delete", "set", "delete", "set", "commit", "commit-all", "commit-all"]
        );
        assert!(plan[..4].iter().all(|s| !s.await_job));
        assert!(plan[4..].iter().all(|s| s.await_job));
    }

    #[test]
    fn test_plan_xpaths() {
        let plan = migration_plan(&request()).unwrap();
        assert_eq!(
            plan[0].operation,
            Operation::Delete {
                xpath: "/config/devices/entry[@name='localhost.localdomain']/device-group/entry[@name='DG1']/devices/entry[@name='0011']".to_string()
            }
        );
        assert_eq!(
            plan[3].operation,
            Operation::Set {
                xpath: "/config/devices/entry[@name='localhost.localdomain']/template-stack/entry[@name='TS2']/devices".to_string(),
                element: "<entry name='0011'/>".to_string(),
            }
        );
    }

    #[test]
    fn test_push_commands_target_destination() {
        let plan = migration_plan(&request()).unwrap();
        let Operation::CommitAll { cmd } = &plan[5].operation else {
            panic!("expected commit-all");
        };
        assert!(cmd.contains("<member>0011</member>"));
        assert!(cmd.contains("<name>TS2</name>"));
        assert!(cmd.contains("<force-template-values>yes</force-template-values>"));

        let Operation::CommitAll { cmd } = &plan[6].operation else {
            panic!("expected commit-all");
        };
        assert!(cmd.starts_with("<commit-all><shared-policy>"));
        assert!(cmd.contains("<entry name='DG2'><devices><entry name='0011'/></devices></entry>"));
    }

    #[test]
    fn test_quote_in_name_is_rejected() {
        let mut req = request();
        req.to_device_group = "bob's".to_string();
        assert!(matches!(
            migration_plan(&req),
            Err(PanError::InvalidName(_))
        ));
    }
}
