use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use shop_manager::{
    auth::Session,
    config,
    models::{
        format_money, Assembly, AssemblyStatus, Customer, NewAssembly, NewCustomer, NewProduct,
        NewRepair, NewSale, NewUser, Permissions, Product, Repair, RepairStatus, Sale, User,
    },
    services::{parse_status, users::DeleteOutcome},
    Shop,
};
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config().context("failed to load configuration")?;
    if let Some(data_dir) = cli.data_dir.clone() {
        config.data_dir = data_dir;
    }
    config::init_tracing(&config.log_level, config.log_json);

    let shop = Shop::open(&config).context("failed to open shop data directory")?;
    shop.auth()
        .ensure_default_user(&config.default_admin())
        .context("failed to initialise the users file")?;
    let mut session = shop
        .auth()
        .login(&cli.username, &cli.password)
        .context("login failed")?;
    debug!(user_id = session.user_id(), "session opened");

    let json = cli.json;
    match cli.command {
        Commands::Products(command) => handle_products_command(&shop, &session, command, json),
        Commands::Customers(command) => handle_customers_command(&shop, &session, command, json),
        Commands::Sales(command) => handle_sales_command(&shop, &session, command, json),
        Commands::Repairs(command) => handle_repairs_command(&shop, &session, command, json),
        Commands::Assemblies(command) => {
            handle_assemblies_command(&shop, &session, command, json)
        }
        Commands::Users(command) => handle_users_command(&shop, &session, command, json),
        Commands::Reports(command) => handle_reports_command(&shop, &session, command, json),
        Commands::Password(args) => {
            shop.users()
                .change_password(&mut session, &cli.password, &args.new_password)
                .context("failed to change password")?;
            println!("Password changed for {}", session.username());
            Ok(())
        }
        Commands::Backup => {
            let report = shop
                .backups()
                .create_backup(&session)
                .context("backup failed")?;
            if json {
                print_json(&report)
            } else {
                println!(
                    "Backup written to {} ({} files)",
                    report.directory.display(),
                    report.files.len()
                );
                Ok(())
            }
        }
    }
}

#[derive(Parser)]
#[command(
    name = "shop-manager",
    about = "Inventory, sales, repairs and assemblies for a computer shop",
    version
)]
struct Cli {
    #[arg(long, global = true, env = "SHOP_DATA_DIR", help = "Directory holding the record files")]
    data_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[arg(long, short = 'u', env = "SHOP_USERNAME", help = "Account to run the command as")]
    username: String,
    #[arg(long, short = 'p', env = "SHOP_PASSWORD", hide_env_values = true)]
    password: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(subcommand)]
    Products(ProductsCommands),
    #[command(subcommand)]
    Customers(CustomersCommands),
    #[command(subcommand)]
    Sales(SalesCommands),
    #[command(subcommand)]
    Repairs(RepairsCommands),
    #[command(subcommand)]
    Assemblies(AssembliesCommands),
    #[command(subcommand)]
    Users(UsersCommands),
    #[command(subcommand)]
    Reports(ReportsCommands),
    /// Change the password of the logged-in account
    Password(PasswordArgs),
    /// Copy every record file into a timestamped backup directory
    Backup,
}

#[derive(Subcommand)]
enum ProductsCommands {
    Add(ProductAddArgs),
    List,
    Search(SearchArgs),
    Show(IdArgs),
    /// Apply a signed stock change, e.g. `adjust-stock 3 -2`
    AdjustStock(AdjustStockArgs),
}

#[derive(Args)]
struct ProductAddArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    category: String,
    #[arg(long)]
    brand: String,
    #[arg(long)]
    cost: Decimal,
    #[arg(long)]
    price: Decimal,
    #[arg(long, default_value_t = 0)]
    stock: u32,
    #[arg(long, default_value_t = 0)]
    min_stock: u32,
}

#[derive(Args)]
struct AdjustStockArgs {
    id: u32,
    #[arg(allow_negative_numbers = true)]
    delta: i64,
}

#[derive(Args)]
struct SearchArgs {
    term: String,
}

#[derive(Args)]
struct IdArgs {
    id: u32,
}

#[derive(Subcommand)]
enum CustomersCommands {
    Add(CustomerAddArgs),
    List,
    Search(SearchArgs),
    Show(IdArgs),
}

#[derive(Args)]
struct CustomerAddArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    address: String,
}

#[derive(Subcommand)]
enum SalesCommands {
    Create(SaleCreateArgs),
    List,
}

#[derive(Args)]
struct SaleCreateArgs {
    #[arg(long)]
    product: u32,
    #[arg(long)]
    customer: u32,
    #[arg(long)]
    quantity: u32,
}

#[derive(Subcommand)]
enum RepairsCommands {
    Create(RepairCreateArgs),
    List,
    Show(IdArgs),
    /// Received, "In Progress", Completed or Collected
    Status(StatusArgs),
}

#[derive(Args)]
struct RepairCreateArgs {
    #[arg(long)]
    customer: u32,
    #[arg(long)]
    device: String,
    #[arg(long)]
    problem: String,
    #[arg(long, default_value_t = Decimal::ZERO)]
    estimate: Decimal,
}

#[derive(Args)]
struct StatusArgs {
    id: u32,
    status: String,
}

#[derive(Subcommand)]
enum AssembliesCommands {
    Create(AssemblyCreateArgs),
    List,
    /// Pending, Assembled or Delivered
    Status(StatusArgs),
}

#[derive(Args)]
struct AssemblyCreateArgs {
    #[arg(long)]
    customer: u32,
    #[arg(long)]
    description: String,
    #[arg(long)]
    price: Decimal,
}

#[derive(Subcommand)]
enum UsersCommands {
    Add(UserAddArgs),
    List,
    Show(IdArgs),
    /// Replace the capability flags of an account
    Permissions(UserPermissionsArgs),
    Activate(IdArgs),
    Deactivate(IdArgs),
    Delete(UserDeleteArgs),
}

#[derive(Args)]
struct PermissionFlags {
    #[arg(long = "products", help = "Allow managing products")]
    manage_products: bool,
    #[arg(long = "customers", help = "Allow managing customers")]
    manage_customers: bool,
    #[arg(long = "sales", help = "Allow sales, repairs and assemblies")]
    manage_sales: bool,
    #[arg(long = "reports", help = "Allow viewing reports")]
    view_reports: bool,
    #[arg(long = "users", help = "Allow managing users")]
    manage_users: bool,
}

impl From<PermissionFlags> for Permissions {
    fn from(flags: PermissionFlags) -> Self {
        Permissions {
            can_manage_products: flags.manage_products,
            can_manage_customers: flags.manage_customers,
            can_manage_sales: flags.manage_sales,
            can_view_reports: flags.view_reports,
            can_manage_users: flags.manage_users,
        }
    }
}

#[derive(Args)]
struct UserAddArgs {
    #[arg(long = "name")]
    username: String,
    #[arg(long = "new-password", env = "SHOP_NEW_PASSWORD", hide_env_values = true)]
    new_password: String,
    #[command(flatten)]
    permissions: PermissionFlags,
}

#[derive(Args)]
struct UserPermissionsArgs {
    id: u32,
    #[command(flatten)]
    permissions: PermissionFlags,
}

#[derive(Args)]
struct UserDeleteArgs {
    id: u32,
    #[arg(long, action = ArgAction::SetTrue, help = "Skip the confirmation prompt")]
    yes: bool,
}

#[derive(Subcommand)]
enum ReportsCommands {
    /// Products at or below a stock threshold
    LowStock(LowStockArgs),
    Sales,
    Profit,
}

#[derive(Args)]
struct LowStockArgs {
    #[arg(long, default_value_t = 5)]
    threshold: u32,
}

#[derive(Args)]
struct PasswordArgs {
    #[arg(long = "new", env = "SHOP_NEW_PASSWORD", hide_env_values = true)]
    new_password: String,
}

fn handle_products_command(
    shop: &Shop,
    session: &Session,
    command: ProductsCommands,
    json: bool,
) -> Result<()> {
    let service = shop.inventory();
    match command {
        ProductsCommands::Add(args) => {
            let product = service
                .add_product(
                    session,
                    NewProduct {
                        name: args.name,
                        category: args.category,
                        brand: args.brand,
                        cost_price: args.cost,
                        sell_price: args.price,
                        stock: args.stock,
                        min_stock_level: args.min_stock,
                    },
                )
                .context("failed to add product")?;
            output_one(&product, json, render_product)
        }
        ProductsCommands::List => {
            let products = service.list_products(session)?;
            output_many(&products, json, render_product)
        }
        ProductsCommands::Search(args) => {
            let products = service.search_products(session, &args.term)?;
            output_many(&products, json, render_product)
        }
        ProductsCommands::Show(args) => {
            let product = service
                .find_product(session, args.id)
                .with_context(|| format!("failed to fetch product {}", args.id))?;
            output_one(&product, json, render_product)
        }
        ProductsCommands::AdjustStock(args) => {
            let product = service
                .adjust_stock(session, args.id, args.delta)
                .with_context(|| format!("failed to adjust stock of product {}", args.id))?;
            output_one(&product, json, render_product)
        }
    }
}

fn handle_customers_command(
    shop: &Shop,
    session: &Session,
    command: CustomersCommands,
    json: bool,
) -> Result<()> {
    let service = shop.customers();
    match command {
        CustomersCommands::Add(args) => {
            let customer = service
                .add_customer(
                    session,
                    NewCustomer {
                        name: args.name,
                        phone: args.phone,
                        email: args.email,
                        address: args.address,
                    },
                )
                .context("failed to add customer")?;
            output_one(&customer, json, render_customer)
        }
        CustomersCommands::List => {
            let customers = service.list_customers(session)?;
            output_many(&customers, json, render_customer)
        }
        CustomersCommands::Search(args) => {
            let customers = service.search_customers(session, &args.term)?;
            output_many(&customers, json, render_customer)
        }
        CustomersCommands::Show(args) => {
            let customer = service
                .find_customer(session, args.id)
                .with_context(|| format!("failed to fetch customer {}", args.id))?;
            output_one(&customer, json, render_customer)
        }
    }
}

fn handle_sales_command(
    shop: &Shop,
    session: &Session,
    command: SalesCommands,
    json: bool,
) -> Result<()> {
    let service = shop.sales();
    match command {
        SalesCommands::Create(args) => {
            let sale = service
                .create_sale(
                    session,
                    NewSale {
                        product_id: args.product,
                        customer_id: args.customer,
                        quantity: args.quantity,
                        cashier: session.username().to_string(),
                    },
                )
                .context("failed to record sale")?;
            output_one(&sale, json, render_sale)
        }
        SalesCommands::List => {
            let sales = service.list_sales(session)?;
            if json {
                return print_json(&sales);
            }
            sales.iter().for_each(render_sale);
            let revenue: Decimal = sales.iter().map(|sale| sale.total_price).sum();
            println!(
                "Summary: {} sales, total revenue {}",
                sales.len(),
                format_money(revenue)
            );
            Ok(())
        }
    }
}

fn handle_repairs_command(
    shop: &Shop,
    session: &Session,
    command: RepairsCommands,
    json: bool,
) -> Result<()> {
    let service = shop.repairs();
    match command {
        RepairsCommands::Create(args) => {
            let repair = service
                .create_repair(
                    session,
                    NewRepair {
                        customer_id: args.customer,
                        device: args.device,
                        problem: args.problem,
                        cost_estimate: args.estimate,
                    },
                )
                .context("failed to create repair")?;
            output_one(&repair, json, render_repair)
        }
        RepairsCommands::List => {
            let repairs = service.list_repairs(session)?;
            output_many(&repairs, json, render_repair)
        }
        RepairsCommands::Show(args) => {
            let repair = service
                .find_repair(session, args.id)
                .with_context(|| format!("failed to fetch repair {}", args.id))?;
            output_one(&repair, json, render_repair)
        }
        RepairsCommands::Status(args) => {
            let status: RepairStatus = parse_status(&args.status)?;
            let repair = service
                .set_status(session, args.id, status)
                .with_context(|| format!("failed to update repair {}", args.id))?;
            output_one(&repair, json, render_repair)
        }
    }
}

fn handle_assemblies_command(
    shop: &Shop,
    session: &Session,
    command: AssembliesCommands,
    json: bool,
) -> Result<()> {
    let service = shop.assemblies();
    match command {
        AssembliesCommands::Create(args) => {
            let assembly = service
                .create_assembly(
                    session,
                    NewAssembly {
                        customer_id: args.customer,
                        description: args.description,
                        price: args.price,
                    },
                )
                .context("failed to create assembly")?;
            output_one(&assembly, json, render_assembly)
        }
        AssembliesCommands::List => {
            let assemblies = service.list_assemblies(session)?;
            output_many(&assemblies, json, render_assembly)
        }
        AssembliesCommands::Status(args) => {
            let status: AssemblyStatus = parse_status(&args.status)?;
            let assembly = service
                .set_status(session, args.id, status)
                .with_context(|| format!("failed to update assembly {}", args.id))?;
            output_one(&assembly, json, render_assembly)
        }
    }
}

fn handle_users_command(
    shop: &Shop,
    session: &Session,
    command: UsersCommands,
    json: bool,
) -> Result<()> {
    let service = shop.users();
    match command {
        UsersCommands::Add(args) => {
            let user = service
                .add_user(
                    session,
                    NewUser {
                        username: args.username,
                        password: args.new_password,
                        permissions: args.permissions.into(),
                    },
                )
                .context("failed to add user")?;
            output_one(&user, json, render_user)
        }
        UsersCommands::List => {
            let users = service.list_users(session)?;
            output_many(&users, json, render_user)
        }
        UsersCommands::Show(args) => {
            let user = service
                .find_user(session, args.id)
                .with_context(|| format!("failed to fetch user {}", args.id))?;
            output_one(&user, json, render_user)
        }
        UsersCommands::Permissions(args) => {
            let user = service
                .edit_permissions(session, args.id, args.permissions.into())
                .with_context(|| format!("failed to update user {}", args.id))?;
            output_one(&user, json, render_user)
        }
        UsersCommands::Activate(args) => {
            let user = service
                .set_active(session, args.id, true)
                .with_context(|| format!("failed to activate user {}", args.id))?;
            output_one(&user, json, render_user)
        }
        UsersCommands::Deactivate(args) => {
            let user = service
                .deactivate_user(session, args.id)
                .with_context(|| format!("failed to deactivate user {}", args.id))?;
            output_one(&user, json, render_user)
        }
        UsersCommands::Delete(args) => {
            let skip_prompt = args.yes;
            let outcome = service
                .delete_user(session, args.id, |user| {
                    skip_prompt || confirm_on_stdin(user)
                })
                .with_context(|| format!("failed to delete user {}", args.id))?;
            if json {
                return print_json(&outcome);
            }
            match outcome {
                DeleteOutcome::Deleted(user) => println!("Deleted user {} ({})", user.id, user.username),
                DeleteOutcome::Cancelled => println!("Deletion cancelled"),
            }
            Ok(())
        }
    }
}

fn handle_reports_command(
    shop: &Shop,
    session: &Session,
    command: ReportsCommands,
    json: bool,
) -> Result<()> {
    let service = shop.reports();
    match command {
        ReportsCommands::LowStock(args) => {
            let report = service.low_stock(session, args.threshold)?;
            if json {
                return print_json(&report);
            }
            println!("Products with stock <= {}:", report.threshold);
            report.products.iter().for_each(render_product);
            println!("Total low stock items: {}", report.products.len());
            Ok(())
        }
        ReportsCommands::Sales => {
            let summary = service.sales_summary(session)?;
            if json {
                return print_json(&summary);
            }
            println!("Total transactions: {}", summary.transactions);
            println!("Total units sold: {}", summary.units_sold);
            println!("Total revenue: {}", format_money(summary.revenue));
            println!("Average sale value: {}", format_money(summary.average_sale));
            Ok(())
        }
        ReportsCommands::Profit => {
            let analysis = service.profit_analysis(session)?;
            if json {
                return print_json(&analysis);
            }
            println!("Total transactions: {}", analysis.transactions);
            println!("Total revenue: {}", format_money(analysis.revenue));
            println!("Total cost: {}", format_money(analysis.cost));
            println!("Total profit: {}", format_money(analysis.profit));
            println!("Profit margin: {}%", format_money(analysis.margin_percent));
            Ok(())
        }
    }
}

fn confirm_on_stdin(user: &User) -> bool {
    print!("Delete user '{}' (id {})? [y/N] ", user.username, user.id);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn output_one<T: Serialize>(value: &T, json: bool, render: fn(&T)) -> Result<()> {
    if json {
        print_json(value)
    } else {
        render(value);
        Ok(())
    }
}

fn output_many<T: Serialize>(values: &[T], json: bool, render: fn(&T)) -> Result<()> {
    if json {
        return print_json(&values);
    }
    if values.is_empty() {
        println!("No records found");
    }
    values.iter().for_each(render);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn render_product(product: &Product) {
    let flag = if product.is_below_minimum() { " (below minimum)" } else { "" };
    println!(
        "- Product {} • {} • {} / {} • cost {} • price {} • stock {}{}",
        product.id,
        product.name,
        product.category,
        product.brand,
        format_money(product.cost_price),
        format_money(product.sell_price),
        product.stock,
        flag
    );
}

fn render_customer(customer: &Customer) {
    println!(
        "- Customer {} • {} • {} • {} • {}",
        customer.id, customer.name, customer.phone, customer.email, customer.address
    );
}

fn render_sale(sale: &Sale) {
    println!(
        "- Sale {} • product {} • customer {} • qty {} • total {} • {} • {}",
        sale.id,
        sale.product_id,
        sale.customer_id,
        sale.quantity,
        format_money(sale.total_price),
        sale.date,
        sale.cashier
    );
}

fn render_repair(repair: &Repair) {
    let completed = if repair.date_completed.is_empty() {
        "-"
    } else {
        repair.date_completed.as_str()
    };
    println!(
        "- Repair {} • customer {} • {} • {} • {} • estimate {} • received {} • completed {}",
        repair.id,
        repair.customer_id,
        repair.device,
        repair.problem,
        repair.status,
        format_money(repair.cost_estimate),
        repair.date_received,
        completed
    );
}

fn render_assembly(assembly: &Assembly) {
    println!(
        "- Assembly {} • customer {} • {} • {} • {} • {}",
        assembly.id,
        assembly.customer_id,
        assembly.description,
        format_money(assembly.price),
        assembly.status,
        assembly.date
    );
}

fn render_user(user: &User) {
    let p = &user.permissions;
    println!(
        "- User {} • {} • products {} • customers {} • sales {} • reports {} • users {} • active {}",
        user.id,
        user.username,
        yes_no(p.can_manage_products),
        yes_no(p.can_manage_customers),
        yes_no(p.can_manage_sales),
        yes_no(p.can_view_reports),
        yes_no(p.can_manage_users),
        yes_no(user.is_active)
    );
}
