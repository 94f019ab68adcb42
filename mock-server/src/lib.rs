//! In-memory stand-in for Moodle's REST web-service endpoint.
//!
//! Serves `/webservice/rest/server.php` over GET and POST, dispatching on the
//! `wsfunction` parameter. Like Moodle, every answer is HTTP 200: failures
//! come back as an `{"exception", "errorcode", "message"}` JSON object.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Query, State},
    routing::get,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

/// The only token the mock accepts.
pub const TOKEN: &str = "mock-token";

/// Id of the category every fresh site starts with.
pub const DEFAULT_CATEGORY: u64 = 1;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Course {
    pub id: u64,
    pub fullname: String,
    pub shortname: String,
    pub categoryid: u64,
    pub visible: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub parent: u64,
    pub coursecount: usize,
}

#[derive(Debug)]
pub struct Site {
    courses: BTreeMap<u64, Course>,
    categories: BTreeMap<u64, Category>,
    next_id: u64,
}

impl Default for Site {
    fn default() -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(
            DEFAULT_CATEGORY,
            Category {
                id: DEFAULT_CATEGORY,
                name: "Miscellaneous".to_string(),
                parent: 0,
                coursecount: 0,
            },
        );
        Self {
            courses: BTreeMap::new(),
            categories,
            next_id: 2,
        }
    }
}

pub type Db = Arc<RwLock<Site>>;

type Params = HashMap<String, String>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Site::default()));
    Router::new()
        .route("/webservice/rest/server.php", get(rest_get).post(rest_post))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn rest_get(State(db): State<Db>, Query(params): Query<Params>) -> Json<Value> {
    Json(dispatch(&db, &params).await)
}

async fn rest_post(
    State(db): State<Db>,
    Query(mut params): Query<Params>,
    Form(body): Form<Params>,
) -> Json<Value> {
    params.extend(body);
    Json(dispatch(&db, &params).await)
}

fn exception(errorcode: &str, message: impl Into<String>) -> Value {
    json!({
        "exception": "moodle_exception",
        "errorcode": errorcode,
        "message": message.into(),
    })
}

async fn dispatch(db: &Db, params: &Params) -> Value {
    if params.get("wstoken").map(String::as_str) != Some(TOKEN) {
        return exception("invalidtoken", "Invalid token - token not found");
    }
    let function = params.get("wsfunction").map(String::as_str).unwrap_or("");
    tracing::debug!(function, params = params.len(), "mock web-service call");

    let result = match function {
        "core_course_get_contents" => get_contents(&*db.read().await, params),
        "core_course_create_courses" => create_courses(&mut *db.write().await, params),
        "core_course_duplicate_course" => duplicate_course(&mut *db.write().await, params),
        "core_course_import_course" => import_course(&*db.read().await, params),
        "core_course_delete_courses" => delete_courses(&mut *db.write().await, params),
        "core_course_get_categories" => get_categories(&*db.read().await, params),
        "core_course_create_categories" => create_categories(&mut *db.write().await, params),
        "core_course_delete_categories" => delete_categories(&mut *db.write().await, params),
        other => Err(exception(
            "servicenotavailable",
            format!("Web service is not available ({other})"),
        )),
    };
    result.unwrap_or_else(|e| e)
}

/// Collect `prefix[i][field]` keys into one map per index, ordered by index.
/// A scalar key `prefix[i]` lands under the empty field name.
pub fn indexed(params: &Params, prefix: &str) -> Vec<BTreeMap<String, String>> {
    let mut items: BTreeMap<usize, BTreeMap<String, String>> = BTreeMap::new();
    for (key, value) in params {
        let Some(rest) = key.strip_prefix(prefix).and_then(|r| r.strip_prefix('[')) else {
            continue;
        };
        let Some((index, rest)) = rest.split_once(']') else {
            continue;
        };
        let Ok(index) = index.parse::<usize>() else {
            continue;
        };
        let field = match rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            Some(field) => field.to_string(),
            None if rest.is_empty() => String::new(),
            None => continue,
        };
        items.entry(index).or_default().insert(field, value.clone());
    }
    items.into_values().collect()
}

fn require<'a>(map: &'a HashMap<String, String>, key: &str) -> Result<&'a str, Value> {
    map.get(key)
        .map(String::as_str)
        .ok_or_else(|| exception("invalidparameter", format!("Missing required key: {key}")))
}

fn require_field<'a>(item: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str, Value> {
    item.get(key)
        .map(String::as_str)
        .ok_or_else(|| exception("invalidparameter", format!("Missing required key: {key}")))
}

fn parse_id(raw: &str) -> Result<u64, Value> {
    raw.parse()
        .map_err(|_| exception("invalidparameter", format!("Invalid id: {raw}")))
}

fn parse_flag(raw: &str) -> Result<bool, Value> {
    match raw {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(exception("invalidparameter", format!("Invalid boolean: {other}"))),
    }
}

impl Site {
    fn take_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn course(&self, id: u64) -> Result<&Course, Value> {
        self.courses
            .get(&id)
            .ok_or_else(|| exception("invalidrecord", format!("Can't find course {id}")))
    }

    fn category(&self, id: u64) -> Result<&Category, Value> {
        self.categories
            .get(&id)
            .ok_or_else(|| exception("invalidrecord", format!("Can't find category {id}")))
    }

    fn shortname_taken(&self, shortname: &str) -> bool {
        self.courses.values().any(|c| c.shortname == shortname)
    }

    fn insert_course(&mut self, fullname: &str, shortname: &str, categoryid: u64, visible: bool) -> Result<Course, Value> {
        self.category(categoryid)?;
        if self.shortname_taken(shortname) {
            return Err(exception(
                "shortnametaken",
                format!("Short name is already used for another course ({shortname})"),
            ));
        }
        let course = Course {
            id: self.take_id(),
            fullname: fullname.to_string(),
            shortname: shortname.to_string(),
            categoryid,
            visible: u8::from(visible),
        };
        self.courses.insert(course.id, course.clone());
        Ok(course)
    }

    fn course_count(&self, category: u64) -> usize {
        self.courses.values().filter(|c| c.categoryid == category).count()
    }
}

fn get_contents(site: &Site, params: &Params) -> Result<Value, Value> {
    let course = site.course(parse_id(require(params, "courseid")?)?)?;
    Ok(json!([{
        "id": course.id * 10,
        "name": "General",
        "visible": course.visible,
        "summary": "",
        "modules": [],
    }]))
}

fn create_courses(site: &mut Site, params: &Params) -> Result<Value, Value> {
    let items = indexed(params, "courses");
    if items.is_empty() {
        return Err(exception("invalidparameter", "No courses given"));
    }
    let mut created = Vec::new();
    for item in &items {
        let visible = match item.get("visible") {
            Some(raw) => parse_flag(raw)?,
            None => true,
        };
        let course = site.insert_course(
            require_field(item, "fullname")?,
            require_field(item, "shortname")?,
            parse_id(require_field(item, "categoryid")?)?,
            visible,
        )?;
        created.push(json!({"id": course.id, "shortname": course.shortname}));
    }
    Ok(Value::Array(created))
}

fn duplicate_course(site: &mut Site, params: &Params) -> Result<Value, Value> {
    site.course(parse_id(require(params, "courseid")?)?)?;
    for option in indexed(params, "options") {
        require_field(&option, "name")?;
        parse_flag(require_field(&option, "value")?)?;
    }
    let visible = match params.get("visible") {
        Some(raw) => parse_flag(raw)?,
        None => true,
    };
    let course = site.insert_course(
        require(params, "fullname")?,
        require(params, "shortname")?,
        parse_id(require(params, "categoryid")?)?,
        visible,
    )?;
    Ok(json!({"id": course.id, "shortname": course.shortname}))
}

fn import_course(site: &Site, params: &Params) -> Result<Value, Value> {
    site.course(parse_id(require(params, "importfrom")?)?)?;
    site.course(parse_id(require(params, "importto")?)?)?;
    if let Some(raw) = params.get("deletecontent") {
        parse_flag(raw)?;
    }
    Ok(Value::Null)
}

fn delete_courses(site: &mut Site, params: &Params) -> Result<Value, Value> {
    let mut warnings = Vec::new();
    for item in indexed(params, "courseids") {
        let id = parse_id(require_field(&item, "")?)?;
        if site.courses.remove(&id).is_none() {
            warnings.push(json!({
                "item": "course",
                "itemid": id,
                "warningcode": "unknowncourseidnumber",
                "message": "Unknown course ID",
            }));
        }
    }
    Ok(json!({ "warnings": warnings }))
}

fn get_categories(site: &Site, params: &Params) -> Result<Value, Value> {
    let criteria = indexed(params, "criteria");
    let mut found = Vec::new();
    for category in site.categories.values() {
        let mut matches = true;
        for criterion in &criteria {
            let key = require_field(criterion, "key")?;
            let value = require_field(criterion, "value")?;
            matches &= match key {
                "id" => category.id.to_string() == value,
                "name" => category.name == value,
                "parent" => category.parent.to_string() == value,
                other => {
                    return Err(exception(
                        "invalidparameter",
                        format!("Invalid criteria key: {other}"),
                    ))
                }
            };
        }
        if matches {
            let mut category = category.clone();
            category.coursecount = site.course_count(category.id);
            found.push(category);
        }
    }
    serde_json::to_value(found).map_err(|e| exception("serializationerror", e.to_string()))
}

fn create_categories(site: &mut Site, params: &Params) -> Result<Value, Value> {
    let items = indexed(params, "categories");
    if items.is_empty() {
        return Err(exception("invalidparameter", "No categories given"));
    }
    let mut created = Vec::new();
    for item in &items {
        let parent = match item.get("parent") {
            Some(raw) => parse_id(raw)?,
            None => 0,
        };
        if parent != 0 {
            site.category(parent)?;
        }
        let category = Category {
            id: site.take_id(),
            name: require_field(item, "name")?.to_string(),
            parent,
            coursecount: 0,
        };
        created.push(json!({"id": category.id, "name": category.name}));
        site.categories.insert(category.id, category);
    }
    Ok(Value::Array(created))
}

fn delete_categories(site: &mut Site, params: &Params) -> Result<Value, Value> {
    for item in indexed(params, "categories") {
        let id = parse_id(require_field(&item, "id")?)?;
        let parent = site.category(id)?.parent;
        let recursive = match item.get("recursive") {
            Some(raw) => parse_flag(raw)?,
            None => false,
        };

        if recursive {
            site.courses.retain(|_, c| c.categoryid != id);
        } else {
            let target = match item.get("newparent") {
                Some(raw) => parse_id(raw)?,
                None => parent,
            };
            if target == 0 || target == id {
                return Err(exception(
                    "invalidparameter",
                    "Category content needs a new parent",
                ));
            }
            site.category(target)?;
            for course in site.courses.values_mut().filter(|c| c.categoryid == id) {
                course.categoryid = target;
            }
        }
        site.categories.remove(&id);
    }
    Ok(Value::Null)
}
