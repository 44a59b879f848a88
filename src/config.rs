use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use secrecy::SecretString;
use url::Url;

const STATE_DIR_NAME: &str = "masterski";
const PREFERENCES_FILE: &str = "preferences.json";
const SESSION_FILE: &str = "session.json";

#[derive(Args, Debug, Default)]
pub struct BackendArgs {
    /// Base URL of the hosted backend project.
    #[clap(long, env = "SUPABASE_URL", value_name = "URL")]
    pub supabase_url: Option<String>,

    /// Public (anon) API key of the project.
    #[clap(long, env = "SUPABASE_ANON_KEY", value_name = "KEY", hide_env_values = true)]
    pub supabase_anon_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub url: Url,
    pub anon_key: SecretString,
}

impl BackendConfig {
    pub fn from_args(args: &BackendArgs) -> Result<Self> {
        let url = args
            .supabase_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow!("missing backend URL, set SUPABASE_URL or --supabase-url"))?;
        let anon_key = args
            .supabase_anon_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                anyhow!("missing backend API key, set SUPABASE_ANON_KEY or --supabase-anon-key")
            })?;

        Ok(Self {
            url: base_url(url)?,
            anon_key: SecretString::new(anon_key.trim().to_owned()),
        })
    }
}

/// Parses the project URL so that relative joins land under it.
fn base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim()).with_context(|| format!("invalid backend URL {raw}"))?;

    if url.cannot_be_a_base() {
        bail!("backend URL {raw} cannot be used as a base");
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

/// Where the local preferences and the signed-in session live.
#[derive(Clone, Debug)]
pub struct StatePaths {
    dir: PathBuf,
}

impl StatePaths {
    pub fn resolve(state_dir: Option<PathBuf>) -> Result<Self> {
        let dir = match state_dir {
            Some(dir) => dir,
            None => dirs::config_dir()
                .map(|dir| dir.join(STATE_DIR_NAME))
                .ok_or_else(|| {
                    anyhow!(
                        "no configuration directory found, set MASTERSKI_STATE_DIR or --state-dir"
                    )
                })?,
        };

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn preferences(&self) -> PathBuf {
        self.dir.join(PREFERENCES_FILE)
    }

    pub fn session(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn args(url: Option<&str>, key: Option<&str>) -> BackendArgs {
        BackendArgs {
            supabase_url: url.map(str::to_owned),
            supabase_anon_key: key.map(str::to_owned),
        }
    }

    #[rstest]
    #[case("https://abc.supabase.co", "https://abc.supabase.co/")]
    #[case("https://abc.supabase.co/", "https://abc.supabase.co/")]
    #[case(" http://localhost:54321/project ", "http://localhost:54321/project/")]
    fn normalizes_base_url(#[case] raw: &str, #[case] expected: &str) {
        let config = BackendConfig::from_args(&args(Some(raw), Some("anon"))).unwrap();

        assert_eq!(config.url.as_str(), expected);
        assert!(config
            .url
            .join("rest/v1/posts")
            .unwrap()
            .path()
            .ends_with("/rest/v1/posts"));
    }

    #[rstest]
    #[case(None, Some("anon"), "SUPABASE_URL")]
    #[case(Some(" "), Some("anon"), "SUPABASE_URL")]
    #[case(Some("https://abc.supabase.co"), None, "SUPABASE_ANON_KEY")]
    fn missing_values_are_named(
        #[case] url: Option<&str>,
        #[case] key: Option<&str>,
        #[case] named: &str,
    ) {
        let error = BackendConfig::from_args(&args(url, key)).unwrap_err();

        assert!(error.to_string().contains(named), "{error}");
    }

    #[test]
    fn rejects_unparseable_url() {
        assert!(BackendConfig::from_args(&args(Some("not a url"), Some("anon"))).is_err());
    }

    #[test]
    fn state_files_live_in_the_state_dir() {
        let paths = StatePaths::resolve(Some(PathBuf::from("/tmp/masterski-test"))).unwrap();

        assert_eq!(paths.preferences(), Path::new("/tmp/masterski-test/preferences.json"));
        assert_eq!(paths.session(), Path::new("/tmp/masterski-test/session.json"));
    }
}
