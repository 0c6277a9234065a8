// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use clap::Parser;
use gadmin_cli::Args;
use gadmin_cli::logger;
use gadmin_cli::run;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt: Args = Args::try_parse()?;
    let log = logger(&opt.log_level)?;

    let mut stdout = std::io::stdout().lock();
    run(&log, opt, &mut stdout).await
}
