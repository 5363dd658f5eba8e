use anyhow::{Context, Result, anyhow};
use relievo_core::ErrorKind;
use std::fs::File;
use std::path::Path;

/// Returns `true` if a job source names a URL rather than a local file.
/// Checked before any path interpretation, so a URL containing slashes
/// still routes as a URL.
pub fn is_url(source: &str) -> bool {
	source.starts_with("http://") || source.starts_with("https://")
}

/// Downloads a job source into `dest`.
pub fn fetch_url(url: &str, dest: &Path) -> Result<()> {
	log::info!("downloading {url}");
	let mut response = reqwest::blocking::get(url)
		.and_then(reqwest::blocking::Response::error_for_status)
		.map_err(|e| anyhow!(ErrorKind::ConnectFailure).context(format!("fetching {url}: {e}")))?;
	let mut file = File::create(dest).with_context(|| format!("creating {dest:?}"))?;
	std::io::copy(&mut response, &mut file).with_context(|| format!("writing {dest:?}"))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_url_detection() {
		assert!(is_url("http://example.com/N10E020.tif"));
		assert!(is_url("https://example.com/a/b/c.tif"));
		assert!(!is_url("/data/tiles/N10E020.tif"));
		assert!(!is_url("relative/http://odd/name.tif"));
	}
}
