// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use anyhow::anyhow;
use anyhow::bail;
use clap::Parser;
use clap::Subcommand;
use gadmin_rs::ALL_PRODUCTS;
use gadmin_rs::AdminClient;
use gadmin_rs::BatchReport;
use gadmin_rs::ClientConfig;
use gadmin_rs::Credentials;
use gadmin_rs::DirectoryApi;
use gadmin_rs::LicensingApi;
use gadmin_rs::Member;
use gadmin_rs::MemberRole;
use gadmin_rs::Product;
use gadmin_rs::lookup_product;
use serde::Serialize;
use slog::Drain;
use slog::Logger;

#[derive(Debug, Parser)]
#[clap(
    name = "gadmin",
    about = "Google Workspace directory and licensing admin"
)]
pub struct Args {
    /// The administrator to act as. Its domain scopes every listing.
    #[clap(long, env = "GADMIN_ADMIN_EMAIL")]
    pub admin_email: Option<String>,

    /// Service account JSON key with domain-wide delegation
    #[clap(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// A ready OAuth access token, used instead of `--credentials`
    #[clap(long, env = "GADMIN_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// JSON client config: base URLs, timeout, retry policy, concurrency
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Serve both APIs from this URL, as `gadmin-mock-server` does
    #[clap(long, env = "GADMIN_BASE_URL")]
    pub base_url: Option<String>,

    #[clap(long, default_value = "info")]
    pub log_level: String,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[clap(subcommand)]
    Users(UsersCommand),

    #[clap(subcommand)]
    Groups(GroupsCommand),

    #[clap(subcommand)]
    Members(MembersCommand),

    #[clap(subcommand)]
    Licenses(LicensesCommand),

    #[clap(subcommand)]
    Products(ProductsCommand),
}

#[derive(Debug, Subcommand)]
pub enum UsersCommand {
    /// Users of the administrator's domain
    List {
        /// A users.list search query, e.g. `isSuspended=true`
        #[clap(long, default_value = "")]
        query: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum GroupsCommand {
    List {
        #[clap(long)]
        query: Option<String>,
    },

    Get { group: String },

    /// Groups a user directly belongs to, with their role in each
    ForUser { user: String },
}

#[derive(Debug, Subcommand)]
pub enum MembersCommand {
    List {
        group: String,

        /// Only these roles, comma separated
        #[clap(long, value_delimiter = ',')]
        roles: Vec<MemberRole>,
    },

    Add {
        group: String,

        #[clap(required = true)]
        emails: Vec<String>,

        #[clap(long, default_value = "member")]
        role: MemberRole,

        #[clap(long)]
        max_concurrency: Option<usize>,
    },

    Remove {
        group: String,

        #[clap(required = true)]
        emails: Vec<String>,

        #[clap(long)]
        max_concurrency: Option<usize>,
    },
}

#[derive(Debug, Subcommand)]
pub enum LicensesCommand {
    /// Assignments of the given products, or of the whole catalog
    List {
        /// SKU ID or SKU name, repeatable
        #[clap(long = "product")]
        products: Vec<String>,

        #[clap(long, default_value_t = gadmin_rs::MAX_LICENSE_PAGE_SIZE)]
        max_results: u32,

        /// Group the output by SKU ID
        #[clap(long)]
        by_product: bool,
    },

    Get { product: String, user: String },

    Assign {
        product: String,

        #[clap(required = true)]
        users: Vec<String>,

        #[clap(long)]
        max_concurrency: Option<usize>,
    },

    Revoke {
        product: String,

        #[clap(required = true)]
        users: Vec<String>,

        #[clap(long)]
        max_concurrency: Option<usize>,
    },

    /// Move a user from one SKU to another
    Reassign { from: String, to: String, user: String },

    /// Return an archived user to the SKU they were archived from
    Unarchive { product: String, user: String },
}

#[derive(Debug, Subcommand)]
pub enum ProductsCommand {
    /// The built-in product and SKU catalog
    List,
}

/// Logs go to stderr so that stdout stays parseable.
pub fn logger(level: &str) -> anyhow::Result<Logger> {
    let level = slog::Level::from_str(level)
        .map_err(|_| anyhow!("unknown log level {level:?}"))?;

    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = slog::LevelFilter::new(drain, level).fuse();

    Ok(Logger::root(drain, slog::o!()))
}

fn product(name: &str) -> anyhow::Result<&'static Product> {
    lookup_product(name).ok_or_else(|| {
        anyhow!("{name:?} is neither a SKU ID nor a SKU name in the catalog")
    })
}

fn print_json<T>(out: &mut impl Write, value: &T) -> anyhow::Result<()>
where
    T: Serialize + ?Sized,
{
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[derive(Serialize)]
struct FailureView<'a, T> {
    item: &'a T,
    error: String,
}

#[derive(Serialize)]
struct ReportView<'a, T> {
    applied: &'a [T],
    unchanged: &'a [T],
    failed: Vec<FailureView<'a, T>>,
}

/// Print a batch report, then fail if any item failed.
fn print_report<T>(
    out: &mut impl Write,
    report: &BatchReport<T>,
) -> anyhow::Result<()>
where
    T: Serialize,
{
    let view = ReportView {
        applied: &report.applied,
        unchanged: &report.unchanged,
        failed: report
            .failed
            .iter()
            .map(|f| FailureView {
                item: &f.item,
                error: error_chain(&f.error),
            })
            .collect(),
    };
    print_json(out, &view)?;

    if !report.is_success() {
        bail!("{} of {} items failed", report.failed.len(), report.total());
    }
    Ok(())
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

struct Session {
    log: Logger,
    client: AdminClient,
    admin_email: String,
}

impl Session {
    fn new(log: &Logger, args: &Args) -> anyhow::Result<Session> {
        let admin_email = args
            .admin_email
            .clone()
            .context("--admin-email (or GADMIN_ADMIN_EMAIL) is required")?;

        let mut config = match &args.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::default(),
        };
        if let Some(base_url) = &args.base_url {
            config = config.with_base_url(base_url);
        }

        let credentials = match (&args.access_token, &args.credentials) {
            (Some(token), _) => Credentials::AccessToken(token.clone()),
            (None, Some(path)) => {
                Credentials::service_account_file(path, &admin_email)?
            }
            (None, None) => bail!(
                "one of --access-token or --credentials \
                (GOOGLE_APPLICATION_CREDENTIALS) is required"
            ),
        };

        let client = AdminClient::new(log.clone(), config, credentials)?;
        Ok(Session { log: log.clone(), client, admin_email })
    }

    fn max_concurrency(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.client.config().max_concurrency)
    }

    async fn directory(&self) -> anyhow::Result<DirectoryApi> {
        DirectoryApi::build(&self.log, self.client.clone(), &self.admin_email)
            .await
            .with_context(|| {
                format!("looking up administrator {}", self.admin_email)
            })
    }

    fn licensing(&self) -> anyhow::Result<LicensingApi> {
        Ok(LicensingApi::new(
            &self.log,
            self.client.clone(),
            &self.admin_email,
        )?)
    }
}

/// Run one command, writing its JSON result to `out`.
pub async fn run(
    log: &Logger,
    args: Args,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    if let Command::Products(ProductsCommand::List) = &args.command {
        return print_json(out, ALL_PRODUCTS);
    }

    let session = Session::new(log, &args)?;

    match args.command {
        Command::Users(UsersCommand::List { query }) => {
            let users = session.directory().await?.list_users(&query).await?;
            print_json(out, &users)
        }

        Command::Groups(command) => {
            let directory = session.directory().await?;
            match command {
                GroupsCommand::List { query } => {
                    let groups = directory.list_groups(query.as_deref()).await?;
                    print_json(out, &groups)
                }
                GroupsCommand::Get { group } => {
                    print_json(out, &directory.get_group(&group).await?)
                }
                GroupsCommand::ForUser { user } => {
                    let memberships = directory
                        .groups_for_user(&user)
                        .await
                        .with_context(|| format!("groups of {user}"))?;
                    print_json(out, &memberships)
                }
            }
        }

        Command::Members(command) => {
            let directory = session.directory().await?;
            match command {
                MembersCommand::List { group, roles } => {
                    let members = directory.list_members(&group, &roles).await?;
                    print_json(out, &members)
                }
                MembersCommand::Add {
                    group,
                    emails,
                    role,
                    max_concurrency,
                } => {
                    let members = emails
                        .iter()
                        .map(|email| Member::new(email, role))
                        .collect();
                    let report = directory
                        .insert_members(
                            &group,
                            members,
                            session.max_concurrency(max_concurrency),
                        )
                        .await;
                    print_report(out, &report)
                }
                MembersCommand::Remove { group, emails, max_concurrency } => {
                    let report = directory
                        .delete_members(
                            &group,
                            emails,
                            session.max_concurrency(max_concurrency),
                        )
                        .await;
                    print_report(out, &report)
                }
            }
        }

        Command::Licenses(command) => {
            run_licenses(&session, command, out).await
        }

        Command::Products(ProductsCommand::List) => {
            print_json(out, ALL_PRODUCTS)
        }
    }
}

async fn run_licenses(
    session: &Session,
    command: LicensesCommand,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let licensing = session.licensing()?;

    match command {
        LicensesCommand::List { products, max_results, by_product } => {
            let products: Vec<Product> = match products.is_empty() {
                true => ALL_PRODUCTS.to_vec(),
                false => products
                    .iter()
                    .map(|p| product(p).cloned())
                    .collect::<anyhow::Result<_>>()?,
            };

            // Listings are scoped by the customer ID, which only the
            // directory knows.
            let directory = session.directory().await?;
            let customer_id = directory.customer_id();

            if by_product {
                let found = licensing
                    .all_domain_licenses_by_product(
                        customer_id,
                        &products,
                        max_results,
                    )
                    .await?;
                print_json(out, &found)
            } else {
                let found = licensing
                    .all_domain_licenses(customer_id, &products, max_results)
                    .await?;
                print_json(out, &found)
            }
        }

        LicensesCommand::Get { product: name, user } => {
            let product = product(&name)?;
            let assignment = licensing.get(product.sku(), &user).await?;
            match assignment {
                Some(assignment) => print_json(out, &assignment),
                None => bail!("{user} does not hold {product}"),
            }
        }

        LicensesCommand::Assign { product: name, users, max_concurrency } => {
            let report = licensing
                .insert_many(
                    product(&name)?,
                    users,
                    session.max_concurrency(max_concurrency),
                )
                .await;
            print_report(out, &report)
        }

        LicensesCommand::Revoke { product: name, users, max_concurrency } => {
            let report = licensing
                .delete_many(
                    product(&name)?,
                    users,
                    session.max_concurrency(max_concurrency),
                )
                .await;
            print_report(out, &report)
        }

        LicensesCommand::Reassign { from, to, user } => {
            let assignment = licensing
                .reassign(product(&from)?.sku(), product(&to)?.sku(), &user)
                .await
                .with_context(|| format!("moving {user} from {from} to {to}"))?;
            print_json(out, &assignment)
        }

        LicensesCommand::Unarchive { product: name, user } => {
            let assignment = licensing
                .unarchive(product(&name)?, &user)
                .await
                .with_context(|| format!("unarchiving {user}"))?;
            print_json(out, &assignment)
        }
    }
}
