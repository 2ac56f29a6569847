use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{ClassInstance, CourseSnapshot};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ClassWithCourse {
    #[serde(flatten)]
    pub class: ClassInstance,
    pub course_info: CourseSnapshot,
}

fn enrich(conn: &rusqlite::Connection, class: ClassInstance) -> anyhow::Result<ClassWithCourse> {
    let course_info = match queries::get_course(conn, &class.course_id)? {
        Some(course) => CourseSnapshot::from_course(&course),
        None => CourseSnapshot::default(),
    };
    Ok(ClassWithCourse { class, course_info })
}

// GET /api/classes
pub async fn list_classes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ClassWithCourse>>, AppError> {
    let db = state.db.lock().unwrap();
    let classes = queries::list_classes(&db)?;

    let mut enriched = Vec::with_capacity(classes.len());
    for class in classes {
        enriched.push(enrich(&db, class)?);
    }
    Ok(Json(enriched))
}

// GET /api/classes/:id
pub async fn get_class(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ClassWithCourse>, AppError> {
    let db = state.db.lock().unwrap();
    let class = queries::get_class(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("class {id}")))?;
    Ok(Json(enrich(&db, class)?))
}
