use anyhow::{bail, Context, Result};
use eq_core::Constants;
use std::collections::HashMap;

/// Applies scenario overrides onto `constants`, rejecting unknown keys.
///
/// Values go through serde so each field keeps its declared type.
pub fn apply_overrides(
    constants: &mut Constants,
    overrides: &HashMap<String, serde_json::Value>,
) -> Result<()> {
    if overrides.is_empty() {
        return Ok(());
    }
    let mut value = serde_json::to_value(&*constants).context("serializing constants")?;
    let Some(fields) = value.as_object_mut() else {
        bail!("constants did not serialize to an object");
    };
    for (key, override_value) in overrides {
        match fields.get_mut(key) {
            Some(slot) => *slot = override_value.clone(),
            None => bail!("unknown override key '{key}'"),
        }
    }
    *constants = serde_json::from_value(value).context("applying constants overrides")?;
    Ok(())
}
