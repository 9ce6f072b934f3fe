use actix_web::{HttpResponse, Responder, get, web};

use crate::app_state::AppState;

/// 根路径健康检查/服务说明
#[get("/")]
pub async fn hello(data: web::Data<AppState>) -> impl Responder {
    let supported = data.parser_registry.supported_extensions();
    HttpResponse::Ok().json(serde_json::json!({
        "message": "SPH 网格分块服务",
        "endpoints": [
            "GET /grid?file=<filename>&div=<dx,dy,dz>",
            "POST /grid/preprocess",
            "GET /grid/chunk?task_id=<id>&chunk_index=<n>&format=<sph|fort>&endian=<little|big>",
            "POST /grid/fort",
            "GET /performance?task_id=<id>",
        ],
        "supported_extensions": supported,
        "resource_dir": data.resource_dir,
        "active_tasks": data.task_store.task_count(),
    }))
}
