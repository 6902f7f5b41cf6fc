use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use fans_core::{FansError, TaggedValue, ValueKind};
use fans_store::{NodeRecord, Resolution, Session};

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Record label, usually the solver input port name
    #[arg(long)]
    pub label: String,
    /// Value as a YAML scalar, sequence or mapping
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub value: Option<String>,
    /// Expected kind; `text` keeps the value verbatim and `real` widens integers,
    /// any other mismatch is an error
    #[arg(long)]
    pub kind: Option<ValueKind>,
    /// Register a file record instead of a value record
    #[arg(long)]
    pub file: Option<PathBuf>,
}

fn parse_value(raw: &str, kind: Option<ValueKind>) -> Result<TaggedValue, FansError> {
    if kind == Some(ValueKind::Text) {
        return Ok(TaggedValue::from(raw));
    }
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(raw).map_err(|err| FansError::config("fans_cli.value_parse", err))?;
    let value = match (TaggedValue::try_from(yaml)?, kind) {
        (TaggedValue::Integer(int), Some(ValueKind::Real)) => TaggedValue::Real(int as f64),
        (value, _) => value,
    };
    match kind {
        Some(expected) if expected != value.kind() => Err(FansError::config(
            "fans_cli.kind_mismatch",
            format!("value parses as {} but {expected} was requested", value.kind()),
        )),
        _ => Ok(value),
    }
}

pub fn run(session: &mut Session, args: &ResolveArgs) -> Result<(), Box<dyn Error>> {
    let resolution: Resolution<NodeRecord> = match (&args.file, &args.value) {
        (Some(path), _) => session.resolve_file(&args.label, path)?,
        (None, Some(raw)) => {
            let value = parse_value(raw, args.kind)?;
            session.resolve_value(&args.label, &value)?
        }
        (None, None) => return Err("either --value or --file is required".into()),
    };
    let verb = if resolution.was_created() { "created" } else { "reused" };
    let record = resolution.record();
    println!("{verb} {} {} {}", record.payload.kind_tag(), record.id, record.label);
    Ok(())
}
