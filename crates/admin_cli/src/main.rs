use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{Currency, Engine, RateTable};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "fisbot_admin")]
#[command(about = "Admin utilities for fisbot (inspect users, manage expense records)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./fisbot.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Users(Users),
    Expenses(Expenses),
}

#[derive(Args, Debug)]
struct Users {
    #[command(subcommand)]
    command: UsersCommand,
}

#[derive(Subcommand, Debug)]
enum UsersCommand {
    /// List all known users.
    List,
}

#[derive(Args, Debug)]
struct Expenses {
    #[command(subcommand)]
    command: ExpensesCommand,
}

#[derive(Subcommand, Debug)]
enum ExpensesCommand {
    /// List expenses, optionally for one sender.
    List(ExpensesListArgs),
    /// Delete one expense record. Permanent.
    Delete(ExpensesDeleteArgs),
    /// Dump all expenses as CSV on stdout.
    Export,
}

#[derive(Args, Debug)]
struct ExpensesListArgs {
    /// Channel sender id to filter by.
    #[arg(long)]
    sender: Option<String>,
}

#[derive(Args, Debug)]
struct ExpensesDeleteArgs {
    #[arg(long)]
    id: i32,
}

async fn connect_db(database_url: &str) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn print_expense(expense: &engine::Expense) {
    println!(
        "{:>5}  {}  {:<24} {:>12} {:>14}  {} ({:.2})  {}",
        expense.id,
        expense.expense_date,
        expense.merchant,
        expense.amount_source.format(Currency::Try),
        expense.amount_target.format(Currency::Mwk),
        expense.rate_category,
        expense.rate_value,
        expense.confidence.as_str(),
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    // Rates are irrelevant for the admin surface; no conversions happen here.
    let engine = Engine::builder()
        .database(db.clone())
        .rates(RateTable::new(0.0, 0.0))
        .build();

    match cli.command {
        Command::Users(Users {
            command: UsersCommand::List,
        }) => {
            use sea_orm::EntityTrait;
            let users = engine::users::Entity::find().all(&db).await?;
            for user in users {
                println!(
                    "{:>5}  {:<20} {:<18} {}",
                    user.id,
                    user.sender_id,
                    user.phone_number.as_deref().unwrap_or("-"),
                    user.created_at.date_naive(),
                );
            }
        }
        Command::Expenses(Expenses {
            command: ExpensesCommand::List(args),
        }) => {
            let expenses = match args.sender {
                Some(sender) => {
                    let Some(user) = engine.user_by_sender(&sender).await? else {
                        eprintln!("user not found: {sender}");
                        std::process::exit(1);
                    };
                    engine.expenses_for(user.id, None).await?
                }
                None => engine.all_expenses().await?,
            };
            for expense in &expenses {
                print_expense(expense);
            }
            eprintln!("{} records", expenses.len());
        }
        Command::Expenses(Expenses {
            command: ExpensesCommand::Delete(args),
        }) => {
            engine.delete_expense(args.id).await?;
            println!("deleted expense {}", args.id);
        }
        Command::Expenses(Expenses {
            command: ExpensesCommand::Export,
        }) => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer.write_record([
                "id",
                "user_id",
                "expense_date",
                "year_month",
                "merchant",
                "amount_try",
                "amount_mwk",
                "rate_category",
                "rate_value",
                "confidence",
            ])?;
            for expense in engine.all_expenses().await? {
                writer.write_record([
                    expense.id.to_string(),
                    expense.user_id.to_string(),
                    expense.expense_date.to_string(),
                    expense.year_month.clone(),
                    expense.merchant.clone(),
                    expense.amount_source.to_string(),
                    expense.amount_target.to_string(),
                    expense.rate_category.to_string(),
                    format!("{:.2}", expense.rate_value),
                    expense.confidence.as_str().to_string(),
                ])?;
            }
            writer.flush()?;
        }
    }

    Ok(())
}
