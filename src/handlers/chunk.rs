use actix_web::{HttpResponse, Responder, get, http::header::ContentType, web};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::codec::{Endian, fort, sph};
use crate::task::ChunkState;

/// 子网格的输出编码
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkFormat {
    /// 原生 .sph 格式，自带元数据
    #[default]
    Sph,
    /// FORTRAN 无格式记录，只有采样值
    Fort,
}

#[derive(Deserialize)]
pub struct ChunkQuery {
    pub task_id: String,
    pub chunk_index: usize,
    #[serde(default)]
    pub format: ChunkFormat,
    #[serde(default)]
    pub endian: Endian,
}

fn join(values: &[impl ToString]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[get("/grid/chunk")]
pub async fn get_grid_chunk(
    data: web::Data<AppState>,
    query: web::Query<ChunkQuery>,
) -> impl Responder {
    let Some(task) = data.task_store.get(&query.task_id) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "无效的 task_id",
            "task_id": query.task_id,
        }));
    };

    let Some(descriptor) = task.chunks.get(query.chunk_index).copied() else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "无效的 chunk_index",
            "chunk_index": query.chunk_index,
        }));
    };

    if let Some(reason) = task.failure() {
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "后台解析失败",
            "task_id": query.task_id,
            "details": reason,
        }));
    }

    // 检查子网格是否已就绪（后台分割是否完成）
    match task.chunk_state(query.chunk_index) {
        ChunkState::Pending => {
            return HttpResponse::Accepted().json(serde_json::json!({
                "error": "子网格正在生成中，请稍后重试",
                "task_id": query.task_id,
                "chunk_index": query.chunk_index,
                "status": "processing",
            }));
        }
        ChunkState::Taken => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "子网格已被请求",
                "task_id": query.task_id,
                "chunk_index": query.chunk_index,
            }));
        }
        ChunkState::Ready => {}
    }

    // 获取并移除子网格（请求后立即释放内存）
    let Some(grid) = task.take_chunk(query.chunk_index) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "子网格已被请求",
            "task_id": query.task_id,
            "chunk_index": query.chunk_index,
        }));
    };

    let encoded = match query.format {
        ChunkFormat::Sph => sph::encode(&grid, query.endian),
        ChunkFormat::Fort => fort::encode(&grid, query.endian),
    };
    let bytes = match encoded {
        Ok(bytes) => bytes,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "编码子网格失败",
                "details": e.to_string(),
            }));
        }
    };

    HttpResponse::Ok()
        .content_type(ContentType::octet_stream())
        .append_header(("X-Chunk-Index", descriptor.index.to_string()))
        .append_header(("X-Chunk-Position", join(&descriptor.position)))
        .append_header(("X-Chunk-Offset", join(&descriptor.offset)))
        .append_header(("X-Chunk-Dims", join(&descriptor.dims)))
        .append_header(("X-Chunk-Remaining", task.remaining_chunk_count().to_string()))
        .append_header(("X-Chunk-Task", query.task_id.clone()))
        .body(bytes)
}
