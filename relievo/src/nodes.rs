use anyhow::{Context, Result, anyhow};
use relievo_core::ErrorKind;
use std::path::Path;

/// Loads the destination list: one worker address per line. Lines starting
/// with `#`, a space or a newline are skipped.
pub fn load_destinations(path: &Path) -> Result<Vec<String>> {
	let text = std::fs::read_to_string(path)
		.map_err(|_| ErrorKind::MissingFile)
		.with_context(|| format!("failed to open destination list {path:?}"))?;
	let addrs: Vec<String> = text
		.lines()
		.filter(|line| !line.starts_with('#') && !line.starts_with(' ') && !line.is_empty())
		.map(|line| line.trim_end().to_string())
		.collect();
	if addrs.is_empty() {
		return Err(anyhow!(ErrorKind::BadInvocation).context(format!("destination list {path:?} is empty")));
	}
	Ok(addrs)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_parse_destinations() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			"# workers\n10.0.0.1\n\n  indented is skipped\nworker-two.example\n"
		)
		.unwrap();
		let addrs = load_destinations(file.path()).unwrap();
		assert_eq!(addrs, vec!["10.0.0.1", "worker-two.example"]);
	}

	#[test]
	fn test_empty_list_is_invalid() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "# nothing here\n").unwrap();
		assert!(load_destinations(file.path()).is_err());
	}

	#[test]
	fn test_missing_file() {
		let err = load_destinations(Path::new("/no/such/file")).unwrap_err();
		assert_eq!(
			relievo_core::error::exit_code(&err),
			ErrorKind::MissingFile.exit_code()
		);
	}
}
