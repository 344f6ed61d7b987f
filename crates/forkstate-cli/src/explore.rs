//! Sibling branches writing one slot, then merged.

use forkstate_core::{ForkResult, MergeReport, Root, RootConfig};
use forkstate_types::{Owner, Position, Resolution};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct MergeOutcome {
    pub resolution: Resolution<Value>,
    pub report: MergeReport<Value>,
}

/// Parse a command-line value as JSON, or keep it as a plain string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Open one fork per value (plus one marking the slot not known when
/// `unknown` is set), detach them all, and merge them into the root state.
pub fn merge_values(values: &[Value], unknown: bool, or_none: bool, config: RootConfig) -> ForkResult<MergeOutcome> {
    let root: Root = Root::with_config(config, Some(Owner::from("merge")));
    let subject = root.slot(Some(Owner::from("subject")), None, None)?;

    let mut children = Vec::with_capacity(values.len() + usize::from(unknown));
    for (i, value) in values.iter().enumerate() {
        let branch = root.begin_fork(Some(Owner::new(format!("branch-{i}"))))?;
        subject.set_value(value.clone(), Some(Position::new(format!("--value #{i}"))))?;
        children.push(branch.detach()?);
    }
    if unknown {
        let branch = root.begin_fork(Some(Owner::from("branch-unknown")))?;
        subject.set_value_not_known(Some(Position::from("--unknown")))?;
        children.push(branch.detach()?);
    }

    let report = root.merge_children(&children, or_none)?;
    let resolution = subject.resolve()?;
    root.finish()?;
    Ok(MergeOutcome { resolution, report })
}
