#[cfg(test)]
mod tests {
    use crate::cli::validation::parse_entry;
    use crate::cli::{Cli, Command, ModeArg};
    use chute_config::EntrySource;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_parse_entry_valid() {
        assert_eq!(
            parse_entry("app=src/app.js"),
            Ok((
                "app".to_string(),
                EntrySource::Single(PathBuf::from("src/app.js"))
            ))
        );
        assert_eq!(
            parse_entry(" admin = ./admin/main.js ").unwrap().0,
            "admin"
        );
    }

    #[test]
    fn test_parse_entry_invalid() {
        assert!(parse_entry("app").is_err());
        assert!(parse_entry("=src/app.js").is_err());
        assert!(parse_entry("app=").is_err());
        assert!(parse_entry("a/b=src/app.js").is_err());
    }

    #[test]
    fn test_build_defaults() {
        let cli = Cli::try_parse_from(["chute", "build"]).unwrap();
        assert!(!cli.verbose);
        assert!(!cli.quiet);
        match cli.command {
            Command::Build(args) => {
                assert_eq!(args.project.root, PathBuf::from("."));
                assert!(args.project.config.is_none());
                assert!(args.project.entries.is_empty());
                assert!(!args.watch);
                assert!(!args.no_minify);
                assert!(args.mode.is_none());
            }
            other => panic!("expected build, got {other:?}"),
        }
    }

    #[test]
    fn test_build_flags() {
        let cli = Cli::try_parse_from([
            "chute",
            "build",
            "--root",
            "site",
            "-c",
            "chute.json",
            "-e",
            "app=src/app.js",
            "-e",
            "admin=src/admin.js",
            "--watch",
            "--no-minify",
            "--mode",
            "development",
            "--no-color",
        ])
        .unwrap();
        assert!(cli.no_color);
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.project.root, PathBuf::from("site"));
        assert_eq!(args.project.config, Some(PathBuf::from("chute.json")));
        let names: Vec<_> = args.project.entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["app", "admin"]);
        assert!(args.watch);
        assert!(args.no_minify);
        assert_eq!(args.mode, Some(ModeArg::Development));
    }

    #[test]
    fn test_check_json() {
        let cli = Cli::try_parse_from(["chute", "-q", "check", "--json"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Command::Check(ref args) if args.json));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["chute", "-v", "-q", "check"]).is_err());
    }

    #[test]
    fn test_bad_entry_is_rejected_by_clap() {
        assert!(Cli::try_parse_from(["chute", "build", "-e", "app"]).is_err());
    }
}
