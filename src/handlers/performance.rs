use actix_web::{HttpResponse, Responder, get, web};
use serde::Deserialize;

use crate::app_state::AppState;

#[derive(Deserialize)]
pub struct PerformanceQuery {
    pub task_id: String,
}

/// 获取指定任务的后台解析/分割耗时
#[get("/performance")]
pub async fn get_performance(
    data: web::Data<AppState>,
    query: web::Query<PerformanceQuery>,
) -> impl Responder {
    let records = data.performance_store.get_records(&query.task_id);
    log::debug!(
        "[性能数据查询] task_id: {}, 记录数: {}",
        query.task_id,
        records.as_ref().map_or(0, |r| r.len())
    );

    // 即使没有记录，也返回空数组，而不是 404 错误
    // 后台任务可能还没有完成任何阶段
    HttpResponse::Ok().json(serde_json::json!({
        "task_id": query.task_id,
        "records": records.unwrap_or_default(),
    }))
}
