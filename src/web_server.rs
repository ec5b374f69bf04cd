use actix_web::{App, HttpServer, dev::Server, middleware, web};
use sqlx::sqlite::SqlitePool;

use crate::config::ServerConfig;
use crate::cooldown::Cooldown;
use crate::judge::Evaluator;
use crate::routes::{
    create_problem_handler, create_user_handler, delete_me_handler, delete_problem_handler,
    get_me_handler, get_problem_handler, json_error_handler, list_problems_handler,
    list_submissions_handler, logout_handler, path_error_handler, query_error_handler,
    run_code_handler, solved_problems_handler, submit_code_handler, update_problem_handler,
};

/// Registers extractor configuration and every route.
///
/// The database pool, [`Evaluator`] and [`Cooldown`] are expected as app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .service(list_problems_handler)
        .service(create_problem_handler)
        .service(get_problem_handler)
        .service(update_problem_handler)
        .service(delete_problem_handler)
        .service(run_code_handler)
        .service(submit_code_handler)
        .service(list_submissions_handler)
        .service(get_me_handler)
        .service(delete_me_handler)
        .service(solved_problems_handler)
        .service(create_user_handler)
        .service(logout_handler);
}

pub fn build_server(
    server_config: ServerConfig,
    db_pool: SqlitePool,
    evaluator: web::Data<Evaluator>,
    cooldown: web::Data<Cooldown>,
) -> std::io::Result<Server> {
    let db_pool = web::Data::new(db_pool);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(db_pool.clone())
            .app_data(evaluator.clone())
            .app_data(cooldown.clone())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind((
        server_config
            .bind_address
            .unwrap_or("127.0.0.1".to_string()),
        server_config.bind_port.unwrap_or(12345),
    ))?
    .run();

    Ok(server)
}
