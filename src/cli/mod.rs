//! Command-line front end: argument parsing and command dispatch for the `quiver`
//! binary. Each command plays the part of one page of the club client.

pub mod connectivity;
pub mod outputformatter;

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::identity::pages::{dashboard_tabs, landing_destination};
use crate::identity::{session, AuthState, Identity, Outcome, Page, Role};
use crate::profiles::{self, Profile};

use connectivity::{AnyTemplateLoader, ClientContext};

pub fn usage(program: &str) -> String {
    format!(
        "Usage:\n  {program} [global flags] <command> [args]\n\n\
Commands:\n  \
guard [--page <page> | --role <role>]   run the session check for a page (default: landing)\n  \
status                                   show local session state without contacting the API\n  \
login --token <token>                    verify a token and store it with its identity\n  \
logout                                   clear the local session\n  \
profile [--save <file.json>]             show (or save) the current user's profile\n  \
members [--search <term>]                list archers (coach only)\n  \
templates <path>...                      fetch templates through the cache\n\n\
Global flags:\n  \
--api <url>              API base (env QUIVER_API_BASE, default http://localhost:3000)\n  \
--state <file>           session storage file (env QUIVER_STATE_FILE)\n  \
--login-page <path>      login redirect override (env QUIVER_LOGIN_PAGE)\n  \
--redirect-window <ms>   redirect coalescing window (env QUIVER_REDIRECT_WINDOW_MS)\n  \
--templates <url|dir>    template base (env QUIVER_TEMPLATE_BASE)\n  \
-h, --help               show this help\n\n\
Pages: {pages}",
        pages = Page::ALL.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Guard { page: Page, role_override: Option<Role> },
    Status,
    Login { token: String },
    Logout,
    Profile { save: Option<PathBuf> },
    Members { search: Option<String> },
    Templates { paths: Vec<String> },
    Help,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalFlags {
    pub api: Option<String>,
    pub state: Option<PathBuf>,
    pub login_page: Option<String>,
    pub redirect_window_ms: Option<u64>,
    pub templates: Option<String>,
}

impl GlobalFlags {
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(v) = &self.api { cfg.api_base = v.clone(); }
        if let Some(v) = &self.state { cfg.state_file = v.clone(); }
        if let Some(v) = &self.login_page { cfg.login_page = Some(v.clone()); }
        if let Some(ms) = self.redirect_window_ms { cfg.redirect_window = Duration::from_millis(ms); }
        if let Some(v) = &self.templates { cfg.template_base = Some(v.clone()); }
    }
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> AppResult<String> {
    if *i + 1 >= args.len() {
        return Err(AppError::user("missing_value".to_string(), format!("{} requires a value", flag)));
    }
    *i += 1;
    Ok(args[*i].clone())
}

/// Parse arguments (without the program name).
pub fn parse_args(args: &[String]) -> AppResult<(GlobalFlags, Command)> {
    let mut flags = GlobalFlags::default();
    let mut cmd_name: Option<String> = None;
    let mut rest: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let a = args[i].as_str();
        match a {
            "-h" | "--help" if cmd_name.is_none() => return Ok((flags, Command::Help)),
            "--api" => flags.api = Some(take_value(args, &mut i, a)?),
            "--state" => flags.state = Some(PathBuf::from(take_value(args, &mut i, a)?)),
            "--login-page" => flags.login_page = Some(take_value(args, &mut i, a)?),
            "--templates" => flags.templates = Some(take_value(args, &mut i, a)?),
            "--redirect-window" => {
                let v = take_value(args, &mut i, a)?;
                let ms = v.parse::<u64>().map_err(|_| {
                    AppError::user("invalid_value".to_string(), format!("--redirect-window expects milliseconds, got '{}'", v))
                })?;
                flags.redirect_window_ms = Some(ms);
            }
            _ if cmd_name.is_none() => cmd_name = Some(a.to_string()),
            _ => rest.push(a.to_string()),
        }
        i += 1;
    }

    let Some(name) = cmd_name else { return Ok((flags, Command::Help)); };
    let cmd = match name.as_str() {
        "guard" => {
            let mut page = Page::Landing;
            let mut role_override = None;
            let mut j = 0;
            while j < rest.len() {
                match rest[j].as_str() {
                    "--page" => {
                        let v = take_value(&rest, &mut j, "--page")?;
                        page = v.parse().map_err(|e: String| AppError::user("invalid_page".to_string(), e))?;
                    }
                    "--role" => {
                        let v = take_value(&rest, &mut j, "--role")?;
                        role_override = Some(v.parse::<Role>().map_err(|e| AppError::user("invalid_role".to_string(), e.to_string()))?);
                    }
                    other => return Err(unexpected(other)),
                }
                j += 1;
            }
            Command::Guard { page, role_override }
        }
        "status" => no_args(&rest, Command::Status)?,
        "logout" => no_args(&rest, Command::Logout)?,
        "login" => match rest.as_slice() {
            [flag, token] if flag == "--token" => Command::Login { token: token.clone() },
            _ => return Err(AppError::user("missing_value", "login requires --token <token>")),
        },
        "profile" => match rest.as_slice() {
            [] => Command::Profile { save: None },
            [flag, file] if flag == "--save" => Command::Profile { save: Some(PathBuf::from(file)) },
            [other, ..] => return Err(unexpected(other)),
        },
        "members" => match rest.as_slice() {
            [] => Command::Members { search: None },
            [flag, term] if flag == "--search" => Command::Members { search: Some(term.clone()) },
            [other, ..] => return Err(unexpected(other)),
        },
        "templates" => {
            if rest.is_empty() {
                return Err(AppError::user("missing_value", "templates requires at least one path"));
            }
            Command::Templates { paths: rest }
        }
        "help" => Command::Help,
        other => return Err(AppError::user("unknown_command".to_string(), format!("unknown command '{}'", other))),
    };
    Ok((flags, cmd))
}

fn unexpected(arg: &str) -> AppError {
    AppError::user("unexpected_argument".to_string(), format!("unexpected argument '{}'", arg))
}

fn no_args(rest: &[String], cmd: Command) -> AppResult<Command> {
    match rest.first() {
        Some(a) => Err(unexpected(a)),
        None => Ok(cmd),
    }
}

/// Run a parsed command. Returns the process exit code.
pub async fn run(ctx: &ClientContext, cmd: Command) -> AppResult<i32> {
    match cmd {
        Command::Help => {
            println!("{}", usage("quiver"));
            Ok(0)
        }
        Command::Guard { page, role_override } => {
            let guard = ctx.guard_for(page);
            let required = role_override.or(page.required_role());
            let outcome = guard.guard(required).await;
            outputformatter::print_outcome(&outcome);
            if let Outcome::Authenticated(id) = &outcome {
                if page == Page::Landing {
                    println!("continue to {}", landing_destination(id));
                } else {
                    let tabs = dashboard_tabs(id.role());
                    println!("tabs: {}", tabs.iter().map(|t| format!("{} {}", t.icon, t.label)).collect::<Vec<_>>().join(" | "));
                }
            }
            Ok(exit_code_for(&outcome))
        }
        Command::Status => {
            let state = AuthState::load(ctx.store.as_ref())?;
            let cached = state.cached_identity();
            println!("storage: {}", ctx.config.state_file.display());
            println!("token: {}", if state.token.is_some() { "present" } else { "absent" });
            println!(
                "cached identity: {}",
                match (&state.user_info, &cached) {
                    (None, _) => "absent".to_string(),
                    (Some(_), Some(id)) => id.role().map(|r| r.to_string()).unwrap_or_else(|| "unknown role".into()),
                    (Some(_), None) => "unreadable".to_string(),
                }
            );
            if !state.is_consistent() {
                println!("state is inconsistent; the next guard run will repair it");
            }
            Ok(0)
        }
        Command::Login { token } => {
            let identity = ctx
                .verifier
                .verify_identity(&token)
                .await
                .map_err(|e| AppError::auth("login_failed".to_string(), e.to_string()))?;
            session::store_login(ctx.store.as_ref(), &token, &identity)?;
            info!(target: "quiver::cli", "stored session for role {:?}", identity.role());
            println!("logged in as {}", describe(&identity));
            Ok(0)
        }
        Command::Logout => {
            ctx.guard_for(Page::Dashboard).logout()?;
            println!("logged out");
            Ok(0)
        }
        Command::Profile { save } => {
            let outcome = ctx.guard_for(Page::Dashboard).guard(None).await;
            let id = match outcome.identity() {
                Some(id) => id.clone(),
                None => {
                    outputformatter::print_outcome(&outcome);
                    return Ok(exit_code_for(&outcome));
                }
            };
            let client = ctx.profiles(Page::Dashboard)?;
            let current = client.me(id.role()).await?;
            let profile = match save {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)?;
                    let edited: Profile = serde_json::from_str(&text)
                        .map_err(|e| AppError::user("invalid_profile".to_string(), format!("{}: {}", path.display(), e)))?;
                    let saved = client.save(current.id.as_ref(), &edited).await?;
                    println!("profile saved");
                    saved
                }
                None => current,
            };
            outputformatter::print_profile(&profile, id.role());
            Ok(0)
        }
        Command::Members { search } => {
            let outcome = ctx.guard_for(Page::ArcherList).guard(Page::ArcherList.required_role()).await;
            if !outcome.is_authenticated() {
                outputformatter::print_outcome(&outcome);
                return Ok(exit_code_for(&outcome));
            }
            let archers = ctx.profiles(Page::ArcherList)?.archers().await?;
            let shown = profiles::filter_members(&archers, search.as_deref().unwrap_or(""));
            outputformatter::print_members(&shown);
            Ok(0)
        }
        Command::Templates { paths } => {
            let loader = AnyTemplateLoader::for_base(ctx.config.template_base())?;
            let set = loader.load_many(&paths).await;
            let mut names: Vec<_> = set.iter().collect();
            names.sort();
            for (name, content) in names {
                let state = if content.is_empty() { "missing".to_string() } else { format!("{} bytes", content.len()) };
                println!("{:<20} {}", name, state);
            }
            Ok(0)
        }
    }
}

fn describe(id: &Identity) -> String {
    format!(
        "{} ({})",
        id.email().unwrap_or("(no email)"),
        id.role().map(|r| r.as_str()).unwrap_or("unknown role")
    )
}

pub fn exit_code_for(outcome: &Outcome) -> i32 {
    match outcome {
        Outcome::Authenticated(_) => 0,
        Outcome::Unauthenticated { .. } => 3,
        Outcome::Error { .. } => 4,
    }
}
