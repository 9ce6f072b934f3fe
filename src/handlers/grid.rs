use actix_web::{HttpResponse, Responder, get, web};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::handlers::preprocess::run_preprocess;

#[derive(Deserialize)]
pub struct GridQuery {
    /// 文件名，例如 "prs_0000001.sph"
    pub file: String,
    /// 各轴分割数，逗号分隔，例如 "2,2,1"
    pub div: Option<String>,
}

/// 网格接口，根据文件名自动识别文件格式并创建分割任务
/// 例如: /grid?file=prs_0000001.sph&div=2,2,1
#[get("/grid")]
pub async fn get_grid(data: web::Data<AppState>, query: web::Query<GridQuery>) -> impl Responder {
    let Some(div) = query.div.as_deref() else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "缺少 div 参数",
            "message": "请提供各轴分割数，例如 /grid?file=xxx.sph&div=2,2,1",
        }));
    };

    let Some(div) = parse_div(div) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "div 参数格式错误",
            "div": div,
        }));
    };

    match run_preprocess(data.get_ref(), &query.file, div) {
        Ok(resp) => HttpResponse::Ok().json(resp),
        Err(err) => err,
    }
}

/// 解析 "dx,dy,dz"
fn parse_div(text: &str) -> Option<[usize; 3]> {
    let values: Vec<usize> = text
        .split(',')
        .map(|s| s.trim().parse::<usize>())
        .collect::<Result<_, _>>()
        .ok()?;
    values.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_div() {
        assert_eq!(parse_div("2,2,1"), Some([2, 2, 1]));
        assert_eq!(parse_div(" 4, 1 ,1"), Some([4, 1, 1]));
        assert_eq!(parse_div("2,2"), None);
        assert_eq!(parse_div("2,x,1"), None);
        assert_eq!(parse_div("-1,1,1"), None);
    }
}
