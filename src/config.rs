//! Worker-count configuration and the optional `-np`-style argv parsing (§6).
//!
//! Mirrors the narrow slice of `timely_communication::Config` this crate actually needs: a
//! single in-process deployment target, so there's no `Cluster`/`zerocopy` variant — those
//! concern cross-process transport, out of scope here (§1 Non-goals).

/// Environment variable consulted by [`Config::from_args`] as a fallback/override for the
/// worker count, named `-np` in the external-interfaces table (§6).
pub const NP_ENV_VAR: &str = "TMPI_NP";

/// How many workers to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub n_workers: usize,
}

impl Config {
    pub fn new(n_workers: usize) -> Config {
        Config { n_workers }
    }

    /// Install the single flag this crate understands into a caller-supplied
    /// [`getopts::Options`], so a hosting binary can merge this crate's flags with its own.
    #[cfg(feature = "getopts")]
    pub fn install_options(opts: &mut getopts::Options) {
        opts.optopt("n", "np", "number of worker threads", "NUM");
    }

    #[cfg(feature = "getopts")]
    pub fn from_matches(matches: &getopts::Matches) -> Result<Config, String> {
        let default = std::env::var(NP_ENV_VAR)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1usize);
        let n_workers = matches.opt_get_default("n", default).map_err(|e| e.to_string())?;
        if n_workers == 0 {
            return Err("worker count must be at least 1".to_string());
        }
        Ok(Config { n_workers })
    }

    /// Parse `-np N` (or `TMPI_NP`, or default to 1) out of an argument iterator, typically
    /// `std::env::args()` (`get_n_from_args` in §6).
    #[cfg(feature = "getopts")]
    pub fn from_args<I: Iterator<Item = String>>(args: I) -> Result<Config, String> {
        let mut opts = getopts::Options::new();
        Config::install_options(&mut opts);
        let matches = opts.parse(args).map_err(|e| e.to_string())?;
        Config::from_matches(&matches)
    }
}

#[cfg(all(test, feature = "getopts"))]
mod tests {
    use super::*;

    #[test]
    fn parses_np_flag() {
        let args = vec!["prog".to_string(), "-n".to_string(), "4".to_string()];
        let cfg = Config::from_args(args.into_iter()).unwrap();
        assert_eq!(cfg.n_workers, 4);
    }

    #[test]
    fn defaults_to_one() {
        let args = vec!["prog".to_string()];
        let cfg = Config::from_args(args.into_iter()).unwrap();
        assert_eq!(cfg.n_workers, 1);
    }
}
