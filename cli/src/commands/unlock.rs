use anyhow::Result;

use super::helpers::unlock;

pub(crate) fn cmd_unlock(pin: Option<&str>, json: bool) -> Result<()> {
    let gate = unlock(pin)?;

    if json {
        println!("{}", serde_json::json!({ "unlocked": gate.unlocked }));
    } else {
        println!("PIN accepted. Editing commands are unlocked.");
    }

    Ok(())
}
