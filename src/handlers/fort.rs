use std::io;

use actix_web::{HttpResponse, Responder, http::header::ContentType, post, web};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::codec::{Endian, fort, sph};
use crate::error::GridError;

#[derive(Deserialize)]
pub struct FortRequest {
    /// 资源目录下的无格式记录文件
    pub file: String,
    /// 记录的尺寸、精度、元数据和裁剪量
    #[serde(flatten)]
    pub layout: fort::RecordLayout,
    /// 输出 .sph 的字节序
    #[serde(default)]
    pub endian: Endian,
}

/// 把 FORTRAN 无格式记录转换为 .sph 字节流
#[post("/grid/fort")]
pub async fn convert_fort(
    data: web::Data<AppState>,
    payload: web::Json<FortRequest>,
) -> impl Responder {
    let request = payload.into_inner();
    let Some(file_path) = data.resource_path(&request.file) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "非法文件名",
            "file": request.file,
        }));
    };

    let layout = request.layout;
    let endian = request.endian;
    let converted = web::block(move || {
        let grid = fort::load_file(&file_path, &layout)?;
        let bytes = sph::encode(&grid, endian)?;
        Ok::<_, GridError>((grid, bytes))
    })
    .await;

    let (grid, bytes) = match converted {
        Ok(Ok(converted)) => converted,
        Ok(Err(GridError::Io(e))) if e.kind() == io::ErrorKind::NotFound => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "文件不存在或无法访问",
                "file": request.file,
                "details": e.to_string(),
            }));
        }
        Ok(Err(e @ (GridError::Format { .. } | GridError::Truncated { .. }))) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "记录与给定的尺寸或精度不符",
                "file": request.file,
                "details": e.to_string(),
            }));
        }
        Ok(Err(e)) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "转换失败",
                "file": request.file,
                "details": e.to_string(),
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "转换线程失败",
                "details": e.to_string(),
            }));
        }
    };

    log::info!(
        "[格式转换] {} -> .sph, dims {:?}, {} 字节",
        request.file,
        grid.dims,
        bytes.len()
    );

    HttpResponse::Ok()
        .content_type(ContentType::octet_stream())
        .append_header((
            "X-Grid-Dims",
            format!("{},{},{}", grid.dims[0], grid.dims[1], grid.dims[2]),
        ))
        .append_header(("X-Grid-Min", format!("{:?}", grid.min)))
        .append_header(("X-Grid-Max", format!("{:?}", grid.max)))
        .body(bytes)
}
