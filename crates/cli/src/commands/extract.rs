use anyhow::Result;

use super::Session;
use crate::cli::ProjectArgs;

pub fn extract_command(args: &ProjectArgs, json: bool) -> Result<()> {
    let session = Session::open(args)?;
    let rules = session.extract()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }

    for rule in &rules {
        if rule.linked_target_labels.is_empty() {
            println!("{} {}", rule.rule_type, rule.label);
        } else {
            let links: Vec<&str> = rule.linked_target_labels.iter().map(|l| l.as_str()).collect();
            println!("{} {} -> {}", rule.rule_type, rule.label, links.join(", "));
        }
    }
    Ok(())
}
