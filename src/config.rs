use crate::permission::PermissionSet;
use crate::transform::LumaWeights;
use crate::Args;
use std::path::PathBuf;

/// Shell configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub gallery_dir: PathBuf,
    pub luma: LumaWeights,
    /// Capabilities treated as granted before any prompt
    pub pre_granted: PermissionSet,
    pub startup_check: bool,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let gallery_dir = args
            .gallery_dir
            .or_else(dirs::picture_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            gallery_dir,
            luma: args.luma,
            pre_granted: PermissionSet::from_granted(&args.pre_grant),
            startup_check: !args.skip_startup_check,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::Capability;
    use clap::Parser;

    #[test]
    fn test_defaults() {
        let config = Config::from(Args::parse_from(["grayscale-shell", "--gallery-dir", "/photos"]));
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9393);
        assert_eq!(config.gallery_dir, PathBuf::from("/photos"));
        assert_eq!(config.luma, LumaWeights::Bt601);
        assert_eq!(config.pre_granted, PermissionSet::default());
        assert!(config.startup_check);
    }

    #[test]
    fn test_pre_grant_list() {
        let config = Config::from(Args::parse_from([
            "grayscale-shell",
            "--pre-grant",
            "camera,storage-read",
            "--luma",
            "bt709",
            "--skip-startup-check",
        ]));
        assert_eq!(config.pre_granted, PermissionSet::from_granted(&Capability::ALL));
        assert_eq!(config.luma, LumaWeights::Bt709);
        assert!(!config.startup_check);
    }
}
