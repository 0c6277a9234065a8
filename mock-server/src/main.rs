// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use gadmin_mock_server::Seed;
use gadmin_mock_server::ServerContext;
use gadmin_mock_server::create_http_server;
use slog::Drain;

#[derive(Debug, Parser)]
#[clap(about = "Mock Google Workspace Admin API server")]
struct Args {
    // Note that port "4567" is arbitrarily chosen.
    #[clap(long, default_value = "127.0.0.1:4567")]
    bind_addr: SocketAddr,

    /// The customer ID the admin user reports
    #[clap(long, default_value = "C0mock")]
    customer_id: String,

    /// A JSON file of users, groups and licenses to start with
    #[clap(long)]
    seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt: Args = Args::try_parse()?;

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let log = slog::Logger::root(drain, slog::o!());

    let context = ServerContext::new(&log, &opt.customer_id);
    if let Some(path) = &opt.seed {
        let seed = Seed::from_file(path)?;
        context.with_state(|state| seed.apply(state))?;
    }

    let http_server =
        create_http_server(&log, Some(opt.bind_addr), Arc::new(context))?;
    if let Err(s) = http_server.await {
        anyhow::bail!("Error from start(): {}", s);
    }

    Ok(())
}
