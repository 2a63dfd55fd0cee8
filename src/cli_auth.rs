use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};

use songlens_server::user::{NewUser, SqliteUserStore, UserFilter, UserManager, UserRole};

use rustyline::{
    completion::Completer,
    highlight::Highlighter,
    history::FileHistory,
    validate::Validator,
    CompletionType, Config, Editor, Helper,
};

const DEFAULT_SUPERUSER_EMAIL: &str = "test@test.com";
const DEFAULT_SUPERUSER_PASSWORD: &str = "testpass123";

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the user database file (user.db inside the server's db dir).
    #[clap(value_parser = parse_path)]
    pub path: PathBuf,
}

#[derive(Parser)]
#[command(name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Creates a user with password login and the given role.
    AddUser {
        email: String,
        password: String,
        #[clap(long, default_value = "")]
        first_name: String,
        #[clap(long, default_value = "")]
        last_name: String,
        #[clap(long, default_value = "Regular")]
        role: String,
    },

    /// Creates an admin user, does nothing if the email is taken.
    CreateSuperuser {
        #[clap(default_value = DEFAULT_SUPERUSER_EMAIL)]
        email: String,
        #[clap(default_value = DEFAULT_SUPERUSER_PASSWORD)]
        password: String,
    },

    /// Replaces the password of a user.
    SetPassword { email: String, password: String },

    /// Shows a user, its roles, permissions and tokens.
    Show { email: String },

    /// Lists all users.
    Users,

    /// Shows all available roles and their permissions.
    ListRoles,

    /// Adds a role to a user.
    AddRole { email: String, role: String },

    /// Removes a role from a user.
    RemoveRole { email: String, role: String },

    /// Marks a user as active or inactive.
    SetActive {
        email: String,
        #[clap(action = clap::ArgAction::Set)]
        active: bool,
    },

    /// Shows the path of the current user db.
    Where,

    /// Close this program.
    Exit,
}

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

const PROMPT: &str = ">> ";

fn parse_role(role: &str) -> std::result::Result<UserRole, CommandExecutionResult> {
    UserRole::from_str(role).ok_or_else(|| {
        CommandExecutionResult::Error(format!(
            "Invalid role '{}'. Valid roles are: Admin, Regular",
            role
        ))
    })
}

fn find_user_id(
    user_manager: &UserManager,
    email: &str,
) -> std::result::Result<usize, CommandExecutionResult> {
    match user_manager.get_user_id(email) {
        Ok(Some(user_id)) => Ok(user_id),
        Ok(None) => Err(CommandExecutionResult::Error(format!(
            "User '{}' not found",
            email
        ))),
        Err(err) => Err(CommandExecutionResult::Error(format!("{}", err))),
    }
}

fn format_created(created: i64) -> String {
    chrono::DateTime::from_timestamp(created, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| created.to_string())
}

fn show_user(user_manager: &UserManager, user_id: usize) -> CommandExecutionResult {
    let user = match user_manager.get_user(user_id) {
        Ok(Some(user)) => user,
        Ok(None) => return CommandExecutionResult::Error(format!("User {} not found", user_id)),
        Err(err) => return CommandExecutionResult::Error(format!("{}", err)),
    };
    println!("User #{}", user.id);
    println!("  email:     {}", user.email);
    println!("  name:      {}", user.full_name());
    println!("  active:    {}", user.is_active);
    println!("  created:   {}", format_created(user.created));

    match user_manager.get_user_roles(user_id) {
        Ok(roles) => {
            println!("\nRoles:");
            if roles.is_empty() {
                println!("  (no roles assigned)");
            }
            for role in roles.iter() {
                println!("  - {}", role.as_str());
            }
        }
        Err(err) => println!("\nFailed to get roles: {}", err),
    }

    match user_manager.get_user_permissions(user_id) {
        Ok(permissions) => {
            println!("\nResolved Permissions:");
            if permissions.is_empty() {
                println!("  (no permissions)");
            }
            for permission in permissions.iter() {
                println!("  - {:?}", permission);
            }
        }
        Err(err) => println!("\nFailed to get permissions: {}", err),
    }

    match user_manager.get_user_tokens(user_id) {
        Ok(tokens) => {
            println!("\nAuth Tokens:");
            for token in tokens.iter() {
                println!("{:#?}", token);
            }
        }
        Err(err) => println!("\nFailed to get tokens: {}", err),
    }
    CommandExecutionResult::Ok
}

fn execute_command(
    line: String,
    user_manager: &UserManager,
    db_path: String,
) -> CommandExecutionResult {
    if line.is_empty() {
        return CommandExecutionResult::Ok;
    }

    let args =
        shlex::split(&line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect());

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));

    let cli = match cli {
        Ok(cli) => cli,
        Err(e) => {
            if e.print().is_err() {
                println!("{}", e);
            }
            return CommandExecutionResult::Ok;
        }
    };

    println!("{} {}", PROMPT, &line);
    match cli.command {
        InnerCommand::AddUser {
            email,
            password,
            first_name,
            last_name,
            role,
        } => {
            let role = match parse_role(&role) {
                Ok(role) => role,
                Err(err) => return err,
            };
            let new_user = NewUser {
                email,
                first_name,
                last_name,
            };
            match user_manager.register_user(new_user, &password, role) {
                Ok(user_id) => println!("Created user #{}", user_id),
                Err(err) => return CommandExecutionResult::Error(format!("{}", err)),
            }
        }
        InnerCommand::CreateSuperuser { email, password } => {
            match user_manager.get_user_id(&email) {
                Ok(Some(user_id)) => {
                    println!("User '{}' already exists (#{})", email, user_id);
                    return CommandExecutionResult::Ok;
                }
                Ok(None) => {}
                Err(err) => return CommandExecutionResult::Error(format!("{}", err)),
            }
            let new_user = NewUser {
                email: email.clone(),
                ..Default::default()
            };
            match user_manager.register_user(new_user, &password, UserRole::Admin) {
                Ok(user_id) => println!("Created superuser '{}' (#{})", email, user_id),
                Err(err) => return CommandExecutionResult::Error(format!("{}", err)),
            }
        }
        InnerCommand::SetPassword { email, password } => {
            let user_id = match find_user_id(user_manager, &email) {
                Ok(id) => id,
                Err(err) => return err,
            };
            if let Err(err) = user_manager.set_password(user_id, &password) {
                return CommandExecutionResult::Error(format!("{}", err));
            }
            println!("Password of '{}' updated", email);
        }
        InnerCommand::Show { email } => {
            let user_id = match find_user_id(user_manager, &email) {
                Ok(id) => id,
                Err(err) => return err,
            };
            return show_user(user_manager, user_id);
        }
        InnerCommand::Users => match user_manager.list_users(&UserFilter::default()) {
            Ok(users) => {
                for user in users {
                    let state = if user.is_active { "" } else { " (inactive)" };
                    println!("#{} {}{}", user.id, user.email, state);
                }
            }
            Err(err) => return CommandExecutionResult::Error(format!("{}", err)),
        },
        InnerCommand::ListRoles => {
            println!("Available Roles:\n");
            for role in &[UserRole::Admin, UserRole::Regular] {
                println!("Role: {}", role.as_str());
                println!("Permissions:");
                for permission in role.permissions() {
                    println!("  - {:?}", permission);
                }
                println!();
            }
        }
        InnerCommand::AddRole { email, role } => {
            let role_enum = match parse_role(&role) {
                Ok(role) => role,
                Err(err) => return err,
            };
            let user_id = match find_user_id(user_manager, &email) {
                Ok(id) => id,
                Err(err) => return err,
            };
            if let Err(err) = user_manager.add_user_role(user_id, role_enum) {
                return CommandExecutionResult::Error(format!("{}", err));
            }
            println!("Role '{}' added to user '{}'", role_enum.as_str(), email);
        }
        InnerCommand::RemoveRole { email, role } => {
            let role_enum = match parse_role(&role) {
                Ok(role) => role,
                Err(err) => return err,
            };
            let user_id = match find_user_id(user_manager, &email) {
                Ok(id) => id,
                Err(err) => return err,
            };
            if let Err(err) = user_manager.remove_user_role(user_id, role_enum) {
                return CommandExecutionResult::Error(format!("{}", err));
            }
            println!("Role '{}' removed from user '{}'", role_enum.as_str(), email);
        }
        InnerCommand::SetActive { email, active } => {
            let user_id = match find_user_id(user_manager, &email) {
                Ok(id) => id,
                Err(err) => return err,
            };
            let update = songlens_server::user::UserUpdate {
                is_active: Some(active),
                ..Default::default()
            };
            if let Err(err) = user_manager.update_user(user_id, &update) {
                return CommandExecutionResult::Error(format!("{}", err));
            }
            println!("User '{}' active: {}", email, active);
        }
        InnerCommand::Where => {
            println!("{}", db_path);
        }
        InnerCommand::Exit => return CommandExecutionResult::Exit,
    }
    CommandExecutionResult::Ok
}

#[derive(rustyline_derive::Hinter)]
struct CommandHelper {
    commands_names: Vec<String>,
}

impl CommandHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .collect();

        CommandHelper { commands_names }
    }
}

impl Completer for CommandHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(' ') {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .map(|c| c.to_string())
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for CommandHelper {}
impl Validator for CommandHelper {}
impl Helper for CommandHelper {}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli_args = CliArgs::parse();
    let user_store = SqliteUserStore::new(&cli_args.path)?;
    let user_manager = UserManager::new(Arc::new(user_store));

    InnerCli::command().print_long_help()?;

    let config = Config::builder()
        .completion_type(CompletionType::List)
        .build();

    let mut rl = Editor::<CommandHelper, FileHistory>::with_config(config)?;
    rl.set_helper(Some(CommandHelper::new()));

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                match execute_command(
                    line.trim().to_string(),
                    &user_manager,
                    cli_args.path.display().to_string(),
                ) {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => break,
                    CommandExecutionResult::Error(err) => {
                        eprintln!("Error: {}", err);
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("CTRL-D: exiting.");
                break;
            }
            Err(e) => {
                println!("Error: {:?}", e);
                break;
            }
        }
    }
    Ok(())
}
