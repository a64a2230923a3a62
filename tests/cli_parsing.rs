use clap::Parser;
use uuid::Uuid;

use mergeward::cli::commands::dlq::DlqCommands;
use mergeward::cli::commands::project::ProjectCommands;
use mergeward::cli::commands::task::TaskCommands;
use mergeward::cli::{Cli, Commands};

#[test]
fn test_parse_serve_overrides() {
    let cli = Cli::try_parse_from(["mergeward", "serve", "--port", "9100", "--no-workers"]).unwrap();
    match cli.command {
        Commands::Serve(args) => {
            assert_eq!(args.port, Some(9100));
            assert!(args.no_workers);
            assert!(args.host.is_none());
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["mergeward", "migrate", "--json", "--config", "/etc/mergeward.yaml"]).unwrap();
    assert!(cli.json);
    assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/etc/mergeward.yaml")));
    assert!(matches!(cli.command, Commands::Migrate));
}

#[test]
fn test_parse_project_add() {
    let cli = Cli::try_parse_from([
        "mergeward",
        "project",
        "add",
        "100",
        "shop",
        "--webhook-secret",
        "s3cret",
        "--trigger-token",
        "glptt-1",
    ])
    .unwrap();

    match cli.command {
        Commands::Project(args) => match args.command {
            ProjectCommands::Add {
                gitlab_project_id,
                name,
                webhook_secret,
                trigger_token,
            } => {
                assert_eq!(gitlab_project_id, 100);
                assert_eq!(name, "shop");
                assert_eq!(webhook_secret.as_deref(), Some("s3cret"));
                assert_eq!(trigger_token.as_deref(), Some("glptt-1"));
            }
            _ => panic!("Wrong project command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_task_list_filters() {
    let cli = Cli::try_parse_from(["mergeward", "task", "list", "--status", "failed", "--mr", "42", "-l", "5"]).unwrap();
    match cli.command {
        Commands::Task(args) => match args.command {
            TaskCommands::List {
                status, mr, limit, ..
            } => {
                assert_eq!(status.as_deref(), Some("failed"));
                assert_eq!(mr, Some(42));
                assert_eq!(limit, 5);
            }
            TaskCommands::Show { .. } => panic!("Wrong task command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_dlq_retry_with_actor() {
    let id = Uuid::new_v4();
    let cli = Cli::try_parse_from(["mergeward", "dlq", "retry", &id.to_string(), "--actor", "ops"]).unwrap();
    match cli.command {
        Commands::Dlq(args) => match args.command {
            DlqCommands::Retry { id: parsed, actor } => {
                assert_eq!(parsed, id);
                assert_eq!(actor, "ops");
            }
            _ => panic!("Wrong dlq command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_rejects_malformed_task_id() {
    assert!(Cli::try_parse_from(["mergeward", "task", "show", "not-a-uuid"]).is_err());
}
