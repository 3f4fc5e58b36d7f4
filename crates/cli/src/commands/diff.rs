use anyhow::Result;
use projgen_core::{Error, golden};
use std::fs;
use std::path::Path;

pub fn diff_command(candidate: &Path, golden_path: &Path) -> Result<()> {
    let candidate = fs::read_to_string(candidate).map_err(Error::from)?;
    let expected = fs::read_to_string(golden_path).map_err(Error::from)?;

    let lines = golden::diff(&candidate, &expected)?;
    golden::validate_diff(&lines)?;
    println!("No differences");
    Ok(())
}
