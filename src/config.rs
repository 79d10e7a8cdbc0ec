// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::Path;

use config::{Config, Environment, File};

mod error;
mod render;

pub use error::ConfigError;
pub use render::{RenderConfig, SourceSpec, TransportAction, TransportEvent};

/// Loads a render configuration from a YAML file. Values can be overridden
/// with `RETIMER_`-prefixed environment variables, e.g. `RETIMER_PERIOD=5`.
pub fn load_render_config(path: &Path) -> Result<RenderConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path))
        .add_source(Environment::with_prefix("RETIMER"))
        .build()?
        .try_deserialize::<RenderConfig>()?;

    let base_path = path.parent().unwrap_or_else(|| Path::new("."));
    config.validate(base_path)
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::selection::SourceKind;

    fn write_config(contents: &str) -> Result<(tempfile::TempDir, PathBuf), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("render.yaml");
        fs::write(&path, contents)?;
        Ok((dir, path))
    }

    #[test]
    fn test_full_config() -> Result<(), Box<dyn Error>> {
        let (dir, path) = write_config(
            r#"
sample_rate: 44100
block_size: 256
channels: 1
length: 20s
period: 5
gain_db: -6
burst: 250ms
source: samples/click.wav
input: music.wav
seed: 7
transport:
  - event: stop
    at: 12s
    for: 2s
  - event: seek
    at: 3s
    to: 30s
"#,
        )?;

        let config = load_render_config(&path)?;
        assert_eq!(config.sample_rate(), 44100);
        assert_eq!(config.block_size(), 256);
        assert_eq!(config.channels(), 1);
        assert_eq!(config.length()?, Duration::from_secs(20));
        assert_eq!(config.period(), 5.0);
        assert_eq!(config.gain_db(), -6.0);
        assert_eq!(config.burst()?, Duration::from_millis(250));
        assert_eq!(config.seed(), Some(7));
        assert_eq!(
            config.source(),
            SourceSpec::File(dir.path().join("samples/click.wav"))
        );
        assert_eq!(config.input(), Some(dir.path().join("music.wav")));

        let actions = config.transport_actions()?;
        assert_eq!(
            actions,
            vec![
                TransportAction::Seek {
                    at: Duration::from_secs(3),
                    to: Duration::from_secs(30),
                },
                TransportAction::Stop {
                    at: Duration::from_secs(12),
                    duration: Duration::from_secs(2),
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_defaults() -> Result<(), Box<dyn Error>> {
        let (_dir, path) = write_config("length: 1m\nsource: noise\n")?;

        let config = load_render_config(&path)?;
        assert_eq!(config.sample_rate(), 48000);
        assert_eq!(config.block_size(), 512);
        assert_eq!(config.channels(), 2);
        assert_eq!(config.length()?, Duration::from_secs(60));
        assert_eq!(config.period(), 15.0);
        assert_eq!(config.burst()?, Duration::from_secs(1));
        assert_eq!(config.source(), SourceSpec::Builtin(SourceKind::Noise));
        assert!(config.input().is_none());
        assert!(config.transport_actions()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_bad_duration() -> Result<(), Box<dyn Error>> {
        let (_dir, path) = write_config("length: forever\n")?;
        assert!(matches!(
            load_render_config(&path),
            Err(ConfigError::Duration(_, _))
        ));
        Ok(())
    }

    #[test]
    fn test_zero_block_size() -> Result<(), Box<dyn Error>> {
        let (_dir, path) = write_config("length: 1s\nblock_size: 0\n")?;
        assert!(matches!(
            load_render_config(&path),
            Err(ConfigError::Invalid(_))
        ));
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_render_config(Path::new("/does/not/exist.yaml")),
            Err(ConfigError::Load(_))
        ));
    }
}
