use gatt_battery_query_lib::cli::Cli;
use gatt_battery_query_lib::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_or_exit();
    logging::init(cli.verbose);
    gatt_battery_query_lib::run(cli).await
}
