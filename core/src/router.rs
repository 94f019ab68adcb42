//! Maps a resource and an operation to a remote function call.
//!
//! # Design
//! Routing is a one-shot table lookup. `route` validates keyword options,
//! picks the `wsfunction` and HTTP method, and lays out the identifying
//! parameters as base params plus indexed lists. It never sees the session,
//! so the auth defaults cannot leak into or be shadowed by a route.
//!
//! Stubs (`ImportCourse`, `UpdateCategory`, `ListCourses`) are routable but
//! return `ApiError::NotImplemented` before anything is built.

use std::fmt;

use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::options::{
    OptionSet, CATEGORY_CREATE_OPTIONS, COURSE_CREATE_OPTIONS, DUPLICATE_OPTIONS, IMPORT_OPTIONS,
};
use crate::params::{encode, IndexedList, ParamMap, ParamValue};

pub const GET_CONTENTS: &str = "core_course_get_contents";
pub const CREATE_COURSES: &str = "core_course_create_courses";
pub const DUPLICATE_COURSE: &str = "core_course_duplicate_course";
pub const IMPORT_COURSE: &str = "core_course_import_course";
pub const DELETE_COURSES: &str = "core_course_delete_courses";
pub const GET_COURSES: &str = "core_course_get_courses";
pub const GET_CATEGORIES: &str = "core_course_get_categories";
pub const CREATE_CATEGORIES: &str = "core_course_create_categories";
pub const UPDATE_CATEGORIES: &str = "core_course_update_categories";
pub const DELETE_CATEGORIES: &str = "core_course_delete_categories";

/// The thing an operation is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Course(u64),
    Courses(Vec<u64>),
    Category(u64),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Course(_) => "course",
            Resource::Courses(_) => "courses",
            Resource::Category(_) => "category",
        }
    }
}

/// Arguments for `core_course_duplicate_course`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub fullname: String,
    pub shortname: String,
    pub category_id: u64,
    pub visible: bool,
    pub options: OptionSet,
}

impl Duplicate {
    /// A visible copy with no extra options.
    pub fn new(fullname: &str, shortname: &str, category_id: u64) -> Self {
        Self {
            fullname: fullname.to_string(),
            shortname: shortname.to_string(),
            category_id,
            visible: true,
            options: OptionSet::new(),
        }
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn options(mut self, options: OptionSet) -> Self {
        self.options = options;
        self
    }
}

/// Every operation the router knows about, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Contents,
    CreateCourse {
        fullname: String,
        shortname: String,
        category_id: u64,
        options: OptionSet,
    },
    DuplicateCourse(Duplicate),
    ExportCourse {
        target: u64,
        delete_content: bool,
        options: OptionSet,
    },
    ImportCourse,
    Delete,
    ListCourses,
    CategoryDetails,
    CreateCategory {
        name: String,
        options: OptionSet,
    },
    UpdateCategory,
    DeleteCategory {
        new_parent: Option<u64>,
        recursive: bool,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Contents => "contents",
            Operation::CreateCourse { .. } => "create_course",
            Operation::DuplicateCourse(_) => "duplicate",
            Operation::ExportCourse { .. } => "export_data",
            Operation::ImportCourse => "import_data",
            Operation::Delete => "delete",
            Operation::ListCourses => "list",
            Operation::CategoryDetails => "details",
            Operation::CreateCategory { .. } => "create_category",
            Operation::UpdateCategory => "update_category",
            Operation::DeleteCategory { .. } => "delete_category",
        }
    }
}

/// A routed call: remote function, HTTP method, and the operation-specific
/// parameters before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedCall {
    pub function: &'static str,
    pub method: HttpMethod,
    pub base: Vec<(String, ParamValue)>,
    pub lists: Vec<IndexedList>,
}

impl RoutedCall {
    fn new(function: &'static str, method: HttpMethod) -> Self {
        Self {
            function,
            method,
            base: vec![("wsfunction".to_string(), ParamValue::from(function))],
            lists: Vec::new(),
        }
    }

    fn param(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.base.push((key.to_string(), value.into()));
        self
    }

    fn list(mut self, list: IndexedList) -> Self {
        self.lists.push(list);
        self
    }

    /// Flatten into the wire map, without session defaults.
    pub fn encode(&self) -> ParamMap {
        encode(&self.base, &self.lists)
    }
}

impl fmt::Display for RoutedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.method, self.function)
    }
}

fn field(name: &str, value: impl Into<ParamValue>) -> (String, ParamValue) {
    (name.to_string(), value.into())
}

/// Look up the remote call for `operation` on `resource`.
pub fn route(resource: &Resource, operation: &Operation) -> Result<RoutedCall, ApiError> {
    use HttpMethod::{Get, Post};

    let call = match (resource, operation) {
        (Resource::Course(id), Operation::Contents) => {
            RoutedCall::new(GET_CONTENTS, Get).param("courseid", *id)
        }
        (
            Resource::Course(_),
            Operation::CreateCourse {
                fullname,
                shortname,
                category_id,
                options,
            },
        ) => {
            options.validate("course.create", COURSE_CREATE_OPTIONS)?;
            let mut fields = vec![
                field("fullname", fullname.as_str()),
                field("shortname", shortname.as_str()),
                field("categoryid", *category_id),
            ];
            fields.extend(options.to_fields());
            RoutedCall::new(CREATE_COURSES, Post).list(IndexedList::new("courses").push_fields(fields))
        }
        (Resource::Course(id), Operation::DuplicateCourse(dup)) => {
            dup.options.validate("course.duplicate", DUPLICATE_OPTIONS)?;
            dup.options.validate_flags("course.duplicate")?;
            RoutedCall::new(DUPLICATE_COURSE, Post)
                .param("courseid", *id)
                .param("fullname", dup.fullname.as_str())
                .param("shortname", dup.shortname.as_str())
                .param("categoryid", dup.category_id)
                .param("visible", dup.visible)
                .list(dup.options.to_named_list("options"))
        }
        (
            Resource::Course(id),
            Operation::ExportCourse {
                target,
                delete_content,
                options,
            },
        ) => {
            options.validate("course.export_data", IMPORT_OPTIONS)?;
            options.validate_flags("course.export_data")?;
            RoutedCall::new(IMPORT_COURSE, Post)
                .param("importfrom", *id)
                .param("importto", *target)
                .param("deletecontent", *delete_content)
                .list(options.to_named_list("options"))
        }
        (Resource::Course(_), Operation::ImportCourse) => {
            return Err(ApiError::NotImplemented("course.import_data"))
        }
        (Resource::Course(id), Operation::Delete) => RoutedCall::new(DELETE_COURSES, Post)
            .list(IndexedList::scalars("courseids", [*id])),
        (Resource::Courses(ids), Operation::Delete) => RoutedCall::new(DELETE_COURSES, Post)
            .list(IndexedList::scalars("courseids", ids.iter().copied())),
        (Resource::Courses(_), Operation::ListCourses) => {
            return Err(ApiError::NotImplemented("courses.list"))
        }
        (Resource::Category(id), Operation::CategoryDetails) => {
            RoutedCall::new(GET_CATEGORIES, Get).list(
                IndexedList::new("criteria")
                    .push_fields(vec![field("key", "id"), field("value", *id)]),
            )
        }
        (Resource::Category(_), Operation::CreateCategory { name, options }) => {
            options.validate("category.create", CATEGORY_CREATE_OPTIONS)?;
            let mut fields = vec![field("name", name.as_str())];
            fields.extend(options.to_fields());
            RoutedCall::new(CREATE_CATEGORIES, Post)
                .list(IndexedList::new("categories").push_fields(fields))
        }
        (Resource::Category(_), Operation::UpdateCategory) => {
            return Err(ApiError::NotImplemented("category.update"))
        }
        (
            Resource::Category(id),
            Operation::DeleteCategory {
                new_parent,
                recursive,
            },
        ) => {
            let mut fields = vec![field("id", *id), field("recursive", *recursive)];
            if let Some(parent) = new_parent {
                fields.push(field("newparent", *parent));
            }
            RoutedCall::new(DELETE_CATEGORIES, Post)
                .list(IndexedList::new("categories").push_fields(fields))
        }
        (resource, operation) => {
            return Err(ApiError::InvalidRoute {
                resource: resource.kind(),
                operation: operation.name(),
            })
        }
    };
    Ok(call)
}
