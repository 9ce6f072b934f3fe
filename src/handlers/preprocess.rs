use std::time::Instant;

use actix_web::{HttpResponse, Responder, post, web};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::decompose::{SharedEdgePlan, SubBlock, divide_share_edge};
use crate::grid::GridHeader;
use crate::performance::{PerformanceRecord, get_unix_timestamp_ms};
use crate::task::TaskData;

#[derive(Deserialize)]
pub struct PreprocessRequest {
    pub file: String,
    /// 各轴分割数 [dx, dy, dz]
    pub div: [usize; 3],
}

#[derive(Serialize, Clone)]
pub struct PreprocessResponse {
    pub task_id: String,
    pub file: String,
    pub file_size: u64,
    pub header: GridHeader,
    pub div: [usize; 3],
    /// 非末尾子网格的尺寸
    pub block: [usize; 3],
    /// 末尾子网格的尺寸
    pub last_block: [usize; 3],
    pub chunks: Vec<SubBlock>,
}

#[post("/grid/preprocess")]
pub async fn preprocess_grid(
    data: web::Data<AppState>,
    payload: web::Json<PreprocessRequest>,
) -> impl Responder {
    match run_preprocess(data.get_ref(), &payload.file, payload.div) {
        Ok(resp) => HttpResponse::Ok().json(resp),
        Err(err) => err,
    }
}

/// 预处理网格文件：快速创建任务并启动后台分割
///
/// ## 功能概述
/// 这个函数是分块加载流程的预处理步骤，只做轻量级操作：
/// 1. 只读取文件头部记录，获得 dims/origin/pitch
/// 2. 根据 div 计算共享边界的分割方案
/// 3. 创建任务存储（task_id）
/// 4. 启动后台任务加载完整网格并分割成子网格
///
/// ## 参数
/// - `app_state`: 应用全局状态，包含解析器注册表、资源目录、任务存储等
/// - `file`: 资源目录下的文件名（如 "prs_0000001.sph"）
/// - `div`: 各轴分割数，每个都必须 >= 1
///
/// ## 返回
/// - `Ok(PreprocessResponse)`: 预处理成功，返回 task_id、元数据、子网格描述
/// - `Err(HttpResponse)`: 预处理失败，返回相应的 HTTP 错误响应
pub fn run_preprocess(
    app_state: &AppState,
    file: &str,
    div: [usize; 3],
) -> Result<PreprocessResponse, HttpResponse> {
    // ==================== 步骤 1: 参数验证与文件路径构建 ====================
    if div.iter().any(|&d| d < 1) {
        return Err(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "分割数必须 >= 1",
            "div": div,
        })));
    }
    let Some(file_path) = app_state.resource_path(file) else {
        return Err(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "非法文件名",
            "file": file,
        })));
    };

    // ==================== 步骤 2: 查找匹配的解析器 ====================
    let parser = match app_state.parser_registry.find_parser_for_file(&file_path) {
        Some((p, _)) => p,
        None => {
            let supported = app_state.parser_registry.supported_extensions();
            return Err(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "不支持的文件格式",
                "file": file,
                "supported_extensions": supported,
            })));
        }
    };

    // ==================== 步骤 3: 获取文件大小 ====================
    let file_size = match std::fs::metadata(&file_path) {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            return Err(HttpResponse::NotFound().json(serde_json::json!({
                "error": "文件不存在或无法访问",
                "file": file,
                "details": e.to_string(),
            })));
        }
    };

    // ==================== 步骤 4: 只读取头部记录 ====================
    let header = match parser.read_header_from_file(&file_path) {
        Ok(h) => h,
        Err(e) => {
            return Err(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "读取文件头失败",
                "file": file,
                "parser": parser.name(),
                "details": e.to_string(),
            })));
        }
    };

    // ==================== 步骤 5: 计算分割方案 ====================
    let Some(plan) = SharedEdgePlan::new(header.dims, div) else {
        return Err(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "分割数与网格尺寸不匹配",
            "dims": header.dims,
            "div": div,
        })));
    };
    let chunks = plan.blocks(header.origin, header.pitch);

    // ==================== 步骤 6: 创建任务存储 ====================
    // 此时子网格还未生成，chunk_data 中都是 None
    let task_data = TaskData::new(header.clone(), div, chunks.clone(), file_path.clone());
    let task_id = app_state.task_store.insert(task_data);

    let Some(task) = app_state.task_store.get(&task_id) else {
        return Err(HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "创建任务失败",
        })));
    };

    // ==================== 步骤 7: 启动后台任务加载并分割 ====================
    // 解析和分割都是阻塞操作，放到阻塞线程池执行，不阻塞预处理响应
    let parser_registry = app_state.parser_registry.clone();
    let performance_store = app_state.performance_store.clone();
    let task_id_clone = task_id.clone();

    actix_web::rt::spawn(async move {
        // 步骤 7.1: 解析完整文件
        let parse_start = Instant::now();
        let parse_ms = get_unix_timestamp_ms();
        let path = task.file_path.clone();
        let parsed = web::block(move || match parser_registry.find_parser_for_file(&path) {
            Some((parser, _)) => parser.parse_from_file(&path).map_err(|e| e.to_string()),
            None => Err("找不到解析器".to_string()),
        })
        .await;

        let grid = match parsed {
            Ok(Ok(grid)) => grid,
            Ok(Err(e)) => {
                error!("[后台解析] 任务 {} 解析文件失败: {}", task_id_clone, e);
                task.mark_failed(e);
                return;
            }
            Err(e) => {
                error!("[后台解析] 任务 {} 解析线程失败: {}", task_id_clone, e);
                task.mark_failed(e.to_string());
                return;
            }
        };

        info!(
            "[后台解析] 任务 {} 文件解析完成，耗时 {}ms",
            task_id_clone,
            parse_start.elapsed().as_millis()
        );
        performance_store.add_record(
            &task_id_clone,
            PerformanceRecord::since(parse_ms, "parse_file", format!("dims {:?}", grid.dims)),
        );

        // 子网格描述来自预处理时的头部，文件被替换后不能再按旧描述下发
        if let Err(e) = task.check_source(&grid) {
            error!("[后台解析] 任务 {} {}", task_id_clone, e);
            task.mark_failed(e);
            return;
        }

        // 步骤 7.2: 共享边界分割
        let split_start = Instant::now();
        let split_ms = get_unix_timestamp_ms();
        let div = task.div;
        let parts = match web::block(move || divide_share_edge(&grid, div)).await {
            Ok(parts) => parts,
            Err(e) => {
                error!("[后台解析] 任务 {} 分割线程失败: {}", task_id_clone, e);
                task.mark_failed(e.to_string());
                return;
            }
        };

        // 空结果表示分割失败，不是“没有子网格”
        if parts.len() != task.chunks.len() {
            error!(
                "[后台解析] 任务 {} 分割失败: 期望 {} 个子网格，得到 {} 个",
                task_id_clone,
                task.chunks.len(),
                parts.len()
            );
            task.mark_failed("文件内容与头部记录不一致，无法分割");
            return;
        }

        // 先记录耗时再放出子网格，取到最后一个子网格时记录已完整
        let count = parts.len();
        info!(
            "[后台解析] 任务 {} 分割完成，共 {} 个子网格，耗时 {}ms",
            task_id_clone,
            count,
            split_start.elapsed().as_millis()
        );
        performance_store.add_record(
            &task_id_clone,
            PerformanceRecord::since(split_ms, "decompose", format!("{} 个子网格", count)),
        );

        for (index, part) in parts.into_iter().enumerate() {
            task.set_chunk(index, part);
        }
    });

    // ==================== 步骤 8: 构造并返回预处理响应 ====================
    // 立即返回，不等待文件解析完成
    // 前端可以通过 chunk 接口请求数据，如果子网格还未就绪会返回相应状态
    Ok(PreprocessResponse {
        task_id,
        file: file.to_string(),
        file_size,
        header,
        div,
        block: plan.block(),
        last_block: plan.last_block(),
        chunks,
    })
}
