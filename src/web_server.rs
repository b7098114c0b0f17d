use std::path::PathBuf;

use actix_web::{App, HttpServer, dev::Server, middleware, web};

use crate::config::{Config, UploadConfig};
use crate::routes::{WorkRoot, greeting, run_handler};
use crate::toolchain::Toolchain;

/// Registers every route of the service on an app
pub fn configure(
    toolchain: web::Data<Toolchain>,
    upload: web::Data<UploadConfig>,
    root: web::Data<WorkRoot>,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(toolchain)
            .app_data(upload)
            .app_data(root)
            .service(web::resource("/run").to(run_handler))
            .default_service(web::to(greeting));
    }
}

pub fn build_server(config: Config, port: u16, work_root: PathBuf) -> std::io::Result<Server> {
    let Config {
        server: server_config,
        toolchain,
        upload,
    } = config;
    let toolchain = web::Data::new(Toolchain::new(toolchain));
    let upload = web::Data::new(upload);
    let root = web::Data::new(WorkRoot(work_root));

    let address = server_config.address();
    log::info!("Listening on {address}:{port}");

    let server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .configure(configure(toolchain.clone(), upload.clone(), root.clone()))
    })
    .bind((address, port))?
    .run();

    Ok(server)
}
