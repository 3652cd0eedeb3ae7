use std::{process, sync::Arc};

use pingora_core::server::{configuration::Opt, Server};

use pingrest::{
    config::Config,
    domain::{self, UserController},
    gateway::{gateway_service, Gateway},
    logging,
    service::ServiceRegistry,
};

fn main() {
    // Read command-line arguments
    let opt = Opt::parse_args();

    // Load configuration with optional override
    let config = match Config::load_yaml_with_opt_override(&opt) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            process::exit(1);
        }
    };

    let log_sink = logging::init(config.log.as_ref());

    // Storage housekeeping tasks run here, so it must outlive the server.
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start storage runtime: {e}");
            process::exit(1);
        }
    };
    let store = match runtime.block_on(domain::open_store(&config.storage)) {
        Ok(store) => store,
        Err(e) => {
            log::error!("Failed to open storage: {e}");
            process::exit(1);
        }
    };

    log::info!("Registering services...");
    let mut services = ServiceRegistry::new();
    if let Err(e) = services.register(
        "user",
        UserController::new(store, config.pager.page_size),
    ) {
        log::error!("Failed to register services: {e}");
        process::exit(1);
    }
    let gateway = Arc::new(Gateway::new(services));

    // Create Pingora server with optional configuration
    let mut server = Server::new_with_opt_and_conf(Some(opt), config.pingora);

    log::info!("Bootstrapping...");
    server.bootstrap();

    log::info!("Bootstrapped. Adding Services...");
    server.add_service(gateway_service(gateway, &config.listeners));
    if let Some(log_sink) = log_sink {
        server.add_service(log_sink);
    }

    log::info!("Starting Server...");
    server.run_forever();
}
