//! Resource handles bound to a `Session`.
//!
//! # Design
//! A handle holds only its identifying key(s) and a borrowed `Session`. Each
//! operation comes in two forms: `build_*` produces the `HttpRequest`
//! without I/O, and the plain method sends it through the session's
//! transport. Read operations return decoded JSON; mutating operations return
//! the raw response.

use serde_json::Value;

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::options::OptionSet;
use crate::router::{route, Duplicate, Operation, Resource};
use crate::session::{parse_json, Session};

fn build(session: &Session, resource: &Resource, operation: &Operation) -> Result<HttpRequest, ApiError> {
    let call = route(resource, operation)?;
    tracing::debug!(resource = resource.kind(), operation = operation.name(), %call, "routed");
    Ok(session.build_request(&call))
}

/// A single course.
#[derive(Debug, Clone, Copy)]
pub struct Course<'s> {
    session: &'s Session,
    id: u64,
}

impl<'s> Course<'s> {
    pub fn new(session: &'s Session, id: u64) -> Self {
        Self { session, id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    fn build(&self, operation: &Operation) -> Result<HttpRequest, ApiError> {
        build(self.session, &Resource::Course(self.id), operation)
    }

    pub fn build_contents(&self) -> Result<HttpRequest, ApiError> {
        self.build(&Operation::Contents)
    }

    /// Sections and modules of the course page.
    pub fn contents(&self) -> Result<Value, ApiError> {
        let response = self.session.send(&self.build_contents()?)?;
        parse_json(&response)
    }

    pub fn build_create(
        &self,
        fullname: &str,
        shortname: &str,
        category_id: u64,
        options: &OptionSet,
    ) -> Result<HttpRequest, ApiError> {
        self.build(&Operation::CreateCourse {
            fullname: fullname.to_string(),
            shortname: shortname.to_string(),
            category_id,
            options: options.clone(),
        })
    }

    /// Create a course. The handle's own id is not sent; Moodle assigns one.
    pub fn create(
        &self,
        fullname: &str,
        shortname: &str,
        category_id: u64,
        options: &OptionSet,
    ) -> Result<HttpResponse, ApiError> {
        let request = self.build_create(fullname, shortname, category_id, options)?;
        self.session.send(&request)
    }

    pub fn build_duplicate(&self, duplicate: &Duplicate) -> Result<HttpRequest, ApiError> {
        self.build(&Operation::DuplicateCourse(duplicate.clone()))
    }

    pub fn duplicate(&self, duplicate: &Duplicate) -> Result<HttpResponse, ApiError> {
        self.session.send(&self.build_duplicate(duplicate)?)
    }

    pub fn build_export_data(
        &self,
        target: u64,
        delete_content: bool,
        options: &OptionSet,
    ) -> Result<HttpRequest, ApiError> {
        self.build(&Operation::ExportCourse {
            target,
            delete_content,
            options: options.clone(),
        })
    }

    /// Copy this course's content into `target`, optionally wiping `target`
    /// first.
    pub fn export_data(
        &self,
        target: u64,
        delete_content: bool,
        options: &OptionSet,
    ) -> Result<HttpResponse, ApiError> {
        self.session
            .send(&self.build_export_data(target, delete_content, options)?)
    }

    /// Always `ApiError::NotImplemented`.
    pub fn import_data(&self) -> Result<HttpResponse, ApiError> {
        self.session.send(&self.build(&Operation::ImportCourse)?)
    }

    pub fn build_delete(&self) -> Result<HttpRequest, ApiError> {
        self.build(&Operation::Delete)
    }

    pub fn delete(&self) -> Result<HttpResponse, ApiError> {
        self.session.send(&self.build_delete()?)
    }
}

/// A set of courses addressed together.
#[derive(Debug, Clone)]
pub struct Courses<'s> {
    session: &'s Session,
    ids: Vec<u64>,
}

impl<'s> Courses<'s> {
    pub fn new(session: &'s Session, ids: Vec<u64>) -> Self {
        Self { session, ids }
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    fn build(&self, operation: &Operation) -> Result<HttpRequest, ApiError> {
        build(self.session, &Resource::Courses(self.ids.clone()), operation)
    }

    pub fn build_delete(&self) -> Result<HttpRequest, ApiError> {
        self.build(&Operation::Delete)
    }

    pub fn delete(&self) -> Result<HttpResponse, ApiError> {
        self.session.send(&self.build_delete()?)
    }

    /// Always `ApiError::NotImplemented`.
    pub fn list(&self) -> Result<Value, ApiError> {
        let response = self.session.send(&self.build(&Operation::ListCourses)?)?;
        parse_json(&response)
    }
}

/// A single course category.
#[derive(Debug, Clone, Copy)]
pub struct Category<'s> {
    session: &'s Session,
    id: u64,
}

impl<'s> Category<'s> {
    pub fn new(session: &'s Session, id: u64) -> Self {
        Self { session, id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    fn build(&self, operation: &Operation) -> Result<HttpRequest, ApiError> {
        build(self.session, &Resource::Category(self.id), operation)
    }

    pub fn build_details(&self) -> Result<HttpRequest, ApiError> {
        self.build(&Operation::CategoryDetails)
    }

    pub fn details(&self) -> Result<Value, ApiError> {
        let response = self.session.send(&self.build_details()?)?;
        parse_json(&response)
    }

    pub fn build_create(&self, name: &str, options: &OptionSet) -> Result<HttpRequest, ApiError> {
        self.build(&Operation::CreateCategory {
            name: name.to_string(),
            options: options.clone(),
        })
    }

    /// Create a category. Use the `parent` option to nest it.
    pub fn create(&self, name: &str, options: &OptionSet) -> Result<HttpResponse, ApiError> {
        self.session.send(&self.build_create(name, options)?)
    }

    /// Always `ApiError::NotImplemented`.
    pub fn update(&self) -> Result<HttpResponse, ApiError> {
        self.session.send(&self.build(&Operation::UpdateCategory)?)
    }

    pub fn build_delete(&self, new_parent: Option<u64>, recursive: bool) -> Result<HttpRequest, ApiError> {
        self.build(&Operation::DeleteCategory {
            new_parent,
            recursive,
        })
    }

    /// Delete the category. Its contents move to `new_parent`, or are deleted
    /// too when `recursive` is set.
    pub fn delete(&self, new_parent: Option<u64>, recursive: bool) -> Result<HttpResponse, ApiError> {
        self.session.send(&self.build_delete(new_parent, recursive)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::http::{HttpMethod, Transport};
    use crate::session::SessionConfig;

    /// Records every request and answers with a canned body.
    #[derive(Clone, Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<HttpRequest>>>,
        body: &'static str,
    }

    impl Recorder {
        fn with_body(body: &'static str) -> Self {
            Self {
                sent: Arc::default(),
                body,
            }
        }

        fn sent(&self) -> Vec<HttpRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for Recorder {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            self.sent.lock().unwrap().push(request.clone());
            Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: self.body.to_string(),
            })
        }
    }

    fn session_with(token: &str, recorder: &Recorder) -> Session {
        Session::with_transport(&SessionConfig::new(token, "https://lms.test"), recorder.clone()).unwrap()
    }

    #[test]
    fn course_delete_matches_wire_example() {
        let recorder = Recorder::with_body(r#"{"warnings":[]}"#);
        let session = session_with("tok", &recorder);
        session.course(10).delete().unwrap();

        let sent = recorder.sent();
        assert_eq!(sent.len(), 1);
        let params = &sent[0].params;
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(params.get("wsfunction"), Some("core_course_delete_courses"));
        assert_eq!(params.get("courseids[0]"), Some("10"));
        assert_eq!(params.get("wstoken"), Some("tok"));
        assert_eq!(params.get("moodlewsrestformat"), Some("json"));
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn category_delete_matches_wire_example() {
        let recorder = Recorder::with_body("null");
        let session = session_with("tok", &recorder);
        let req = session.category(5).build_delete(Some(2), true).unwrap();
        assert_eq!(req.params.get("categories[0][id]"), Some("5"));
        assert_eq!(req.params.get("categories[0][recursive]"), Some("1"));
        assert_eq!(req.params.get("categories[0][newparent]"), Some("2"));
        assert!(recorder.sent().is_empty(), "build_* must not send");
    }

    #[test]
    fn contents_decodes_json() {
        let recorder = Recorder::with_body(r#"[{"id":1,"name":"General","modules":[]}]"#);
        let session = session_with("tok", &recorder);
        let sections = session.course(3).contents().unwrap();
        assert_eq!(sections[0]["name"], "General");
        assert_eq!(recorder.sent()[0].method, HttpMethod::Get);
        assert_eq!(recorder.sent()[0].params.get("courseid"), Some("3"));
    }

    #[test]
    fn details_surfaces_malformed_body() {
        let recorder = Recorder::with_body("<html>oops</html>");
        let session = session_with("tok", &recorder);
        let err = session.category(1).details().unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
    }

    #[test]
    fn unsupported_option_sends_nothing() {
        let recorder = Recorder::with_body("{}");
        let session = session_with("tok", &recorder);
        let dup = Duplicate::new("Copy", "CPY", 1).options(OptionSet::new().with("bogus", true));
        let err = session.course(1).duplicate(&dup).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedOption { .. }));
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn export_rejects_duplicate_only_option_and_sends_nothing() {
        let recorder = Recorder::with_body("null");
        let session = session_with("tok", &recorder);
        let err = session
            .course(1)
            .export_data(2, false, &OptionSet::new().with("users", true))
            .unwrap_err();
        match err {
            ApiError::UnsupportedOption { operation, unknown } => {
                assert_eq!(operation, "course.export_data");
                assert_eq!(unknown.into_iter().collect::<Vec<_>>(), vec!["users".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn create_rejects_unknown_field_and_sends_nothing() {
        let recorder = Recorder::with_body("[]");
        let session = session_with("tok", &recorder);
        let err = session
            .course(0)
            .create("Physics", "PHY", 1, &OptionSet::new().with("teacher", "Ada"))
            .unwrap_err();
        match err {
            ApiError::UnsupportedOption { operation, unknown } => {
                assert_eq!(operation, "course.create");
                assert_eq!(unknown.into_iter().collect::<Vec<_>>(), vec!["teacher".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn non_flag_option_values_send_nothing() {
        let recorder = Recorder::with_body("{}");
        let session = session_with("tok", &recorder);
        let dup = Duplicate::new("Copy", "CPY", 1)
            .options(OptionSet::new().with("users", "true").with("blocks", 7));
        let err = session.course(1).duplicate(&dup).unwrap_err();
        assert!(matches!(err, ApiError::InvalidOptionValue { .. }));

        let err = session
            .course(1)
            .export_data(2, true, &OptionSet::new().with("filters", 2))
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidOptionValue { ref name, .. } if name == "filters"));
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn stubs_send_nothing() {
        let recorder = Recorder::with_body("{}");
        let session = session_with("tok", &recorder);
        assert!(matches!(session.course(1).import_data(), Err(ApiError::NotImplemented(_))));
        assert!(matches!(session.courses([1, 2]).list(), Err(ApiError::NotImplemented(_))));
        assert!(matches!(session.category(1).update(), Err(ApiError::NotImplemented(_))));
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn bulk_delete_indexes_every_id() {
        let recorder = Recorder::with_body(r#"{"warnings":[]}"#);
        let session = session_with("tok", &recorder);
        let courses = session.courses([20, 21, 22, 23]);
        courses.delete().unwrap();
        let params = &recorder.sent()[0].params;
        for (i, id) in courses.ids().iter().enumerate() {
            assert_eq!(params.get(&format!("courseids[{i}]")), Some(id.to_string().as_str()));
        }
        assert!(!params.contains_key("courseids[4]"));
    }

    #[test]
    fn reauthenticating_leaves_existing_handles_alone() {
        let first = Recorder::with_body(r#"{"warnings":[]}"#);
        let second = Recorder::with_body(r#"{"warnings":[]}"#);
        let old_session = session_with("old-token", &first);
        let handle = old_session.course(7);

        let new_session = session_with("new-token", &second);
        let _other = new_session.course(7);

        let req = handle.build_delete().unwrap();
        assert_eq!(req.params.get("wstoken"), Some("old-token"));
        handle.delete().unwrap();
        assert_eq!(first.sent().len(), 1);
        assert!(second.sent().is_empty());
    }

    #[test]
    fn defaults_survive_every_operation() {
        let recorder = Recorder::with_body("{}");
        let session = session_with("tok", &recorder);
        let course = session.course(1);
        let category = session.category(2);
        let opts = OptionSet::new();
        let requests = [
            course.build_contents().unwrap(),
            course.build_create("F", "S", 1, &opts).unwrap(),
            course.build_duplicate(&Duplicate::new("F", "S", 1)).unwrap(),
            course.build_export_data(9, false, &opts).unwrap(),
            course.build_delete().unwrap(),
            session.courses([1]).build_delete().unwrap(),
            category.build_details().unwrap(),
            category.build_create("Science", &OptionSet::new().with("parent", 0)).unwrap(),
            category.build_delete(None, false).unwrap(),
        ];
        for req in &requests {
            assert_eq!(req.params.get("wstoken"), Some("tok"));
            assert_eq!(req.params.get("moodlewsrestformat"), Some("json"));
            assert!(req.params.contains_key("wsfunction"));
        }
    }

    #[test]
    fn handles_are_cheap_to_copy() {
        let session = session_with("tok", &Recorder::default());
        let a = session.course(1);
        let b = a;
        assert_eq!(a.id(), b.id());
    }
}
