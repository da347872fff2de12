//! Host crate wrapped around a generated `template_routes.rs`.

#![allow(clippy::all)]

pub mod template_routes;

pub mod host {
    use std::fmt;

    use serde::Serialize;
    use serde_json::{json, Value};

    use crate::template_routes::{
        Context, Error, Request, ResponseWriter, RoutesReceiver, StatusCoder,
    };

    #[derive(Debug, Clone, Serialize)]
    pub struct User {
        pub name: String,
        pub age: i64,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct Post {
        pub title: String,
    }

    #[derive(Debug, Clone)]
    pub struct SignupForm {
        pub name: String,
        pub age: i64,
    }

    #[derive(Debug, Clone)]
    pub struct SlotForm {
        pub day: String,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct Receipt {
        pub total: u32,
    }

    impl StatusCoder for Receipt {
        fn status_code(&self) -> u16 {
            202
        }
    }

    #[derive(Debug)]
    pub struct Problem;

    impl fmt::Display for Problem {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("payment required")
        }
    }

    impl std::error::Error for Problem {}

    impl StatusCoder for Problem {
        fn status_code(&self) -> u16 {
            402
        }
    }

    pub struct Host;

    impl RoutesReceiver for Host {
        fn Book(&self, form: SlotForm) -> String {
            form.day
        }

        fn Checkout(&self, ctx: &Context) -> Result<Receipt, Problem> {
            match ctx.value("fail") {
                Some(_) => Err(Problem),
                None => Ok(Receipt { total: 7 }),
            }
        }

        fn CreateUser(&self, _ctx: &Context, form: SignupForm) -> Result<User, Error> {
            if form.name == "taken" {
                return Err("name already taken".into());
            }
            Ok(User {
                name: form.name,
                age: form.age,
            })
        }

        fn Download(&self, path: String) -> Value {
            json!({ "path": path })
        }

        fn Feed(&self, request: &Request, response: &mut dyn ResponseWriter) -> (Vec<Post>, bool) {
            if request.header("x-stop").is_some() {
                response.write_status(204);
                response.write_body(b"handled");
                return (Vec::new(), false);
            }
            let posts = vec![Post {
                title: "hello".to_string(),
            }];
            (posts, true)
        }

        fn GetUser(&self, _ctx: &Context, id: String) -> Value {
            json!({ "id": id })
        }

        fn Login(&self, _ctx: &Context) -> Value {
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use crate::host::Host;
    use crate::template_routes::*;

    /// Serializes the data carrier, acting out what each fragment does.
    struct JsonRenderer;

    impl Renderer for JsonRenderer {
        fn render<R, T: serde::Serialize>(
            &self,
            fragment: &str,
            data: &TemplateData<'_, R, T>,
        ) -> Result<Vec<u8>, Error> {
            match fragment {
                "POST /login Login(ctx)" => {
                    data.header("set-cookie", "session=1");
                    data.redirect("/", 303)?;
                }
                "GET /teapot" => {
                    data.status_code(418);
                }
                "GET /checkout Checkout(ctx)" if data.request().header("x-override").is_some() => {
                    data.status_code(299);
                }
                "GET /broken" => return Err("missing is not defined".into()),
                _ => {}
            }
            Ok(serde_json::to_vec(data)?)
        }
    }

    #[derive(Default)]
    struct CaptureLogger {
        messages: Mutex<Vec<String>>,
    }

    impl Logger for CaptureLogger {
        fn error(&self, message: &str, err: &(dyn std::error::Error + 'static)) {
            if let Ok(mut messages) = self.messages.lock() {
                messages.push(format!("{message}: {err}"));
            }
        }
    }

    #[derive(Default)]
    struct TestMux {
        handlers: HashMap<String, Handler>,
    }

    impl Mux for TestMux {
        fn handle(&mut self, pattern: &str, handler: Handler) {
            self.handlers.insert(pattern.to_string(), handler);
        }
    }

    #[derive(Debug, Default)]
    struct Recorder {
        headers: Vec<(String, String)>,
        status: u16,
        body: Vec<u8>,
    }

    impl ResponseWriter for Recorder {
        fn headers_mut(&mut self) -> &mut Vec<(String, String)> {
            &mut self.headers
        }

        fn write_status(&mut self, status: u16) {
            self.status = status;
        }

        fn write_body(&mut self, body: &[u8]) {
            self.body.extend_from_slice(body);
        }
    }

    impl Recorder {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        }

        fn text(&self) -> String {
            String::from_utf8_lossy(&self.body).into_owned()
        }
    }

    fn mux_with(config: RoutesConfig) -> TestMux {
        let mut mux = TestMux::default();
        routes(&mut mux, Arc::new(Host), Arc::new(JsonRenderer), config);
        mux
    }

    fn serve(mux: &TestMux, pattern: &str, request: Request) -> Recorder {
        let handler = mux.handlers.get(pattern).expect("pattern registered");
        let mut recorder = Recorder::default();
        handler(&request, &mut recorder);
        recorder
    }

    fn form_post(uri: &str, body: &str) -> Request {
        let mut request = Request::new("POST", uri);
        request.headers.push((
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        ));
        request.body = body.as_bytes().to_vec();
        request
    }

    #[test]
    fn test_every_route_is_registered() {
        let mux = mux_with(RoutesConfig::default());
        assert_eq!(mux.handlers.len(), 9);
        assert!(mux.handlers.contains_key("GET /files/{path...}"));
    }

    #[test]
    fn test_synthesized_call_receives_path_value() {
        let mux = mux_with(RoutesConfig::default());
        let mut request = Request::new("GET", "/user/42");
        request.path_values.insert("id".to_string(), "42".to_string());
        let response = serve(&mux, "GET /user/{id}", request);
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some("text/html; charset=utf-8"));
        assert!(response.text().contains("\"result\":{\"id\":\"42\"}"));
        assert!(response.text().contains("\"path\":\"/user/42\""));
    }

    #[test]
    fn test_form_struct_uses_label_status() {
        let mux = mux_with(RoutesConfig::default());
        let response = serve(&mux, "POST /user", form_post("/user", "Name=Ann&Age=30"));
        assert_eq!(response.status, 201);
        assert!(response.text().contains("\"name\":\"Ann\""));
        assert_eq!(
            response.header("content-length"),
            Some(response.body.len().to_string().as_str())
        );
    }

    #[test]
    fn test_conversion_and_validation_errors_answer_400() {
        let mux = mux_with(RoutesConfig::default());
        let response = serve(&mux, "POST /user", form_post("/user", "Name=A&Age=old"));
        assert_eq!(response.status, 400);
        assert_eq!(response.header("content-type"), Some("text/plain; charset=utf-8"));
        let text = response.text();
        assert!(text.contains("Name: must be at least 2 characters"));
        assert!(text.contains("Age: invalid digit found in string"));
        assert!(text.find("Name:") < text.find("Age:"));

        let response = serve(&mux, "POST /user", form_post("/user", "Name=Ann&Age=-1"));
        assert_eq!(response.status, 400);
        assert_eq!(response.text(), "Age: must be at least 0");
    }

    #[test]
    fn test_invocation_error_answers_500() {
        let mux = mux_with(RoutesConfig::default());
        let response = serve(&mux, "POST /user", form_post("/user", "Name=taken&Age=3"));
        assert_eq!(response.status, 500);
        assert_eq!(response.text(), "name already taken");
    }

    #[test]
    fn test_string_bound_is_checked() {
        let mux = mux_with(RoutesConfig::default());
        let response = serve(&mux, "POST /book", form_post("/book", "day=2023-12-31"));
        assert_eq!(response.status, 400);
        assert_eq!(response.text(), "day: must be at least 2024-01-01");

        let response = serve(&mux, "POST /book", form_post("/book", "day=2024-02-01"));
        assert_eq!(response.status, 200);
        assert!(response.text().contains("\"result\":\"2024-02-01\""));
    }

    #[test]
    fn test_false_flag_leaves_the_response_to_the_callee() {
        let mux = mux_with(RoutesConfig::default());
        let mut request = Request::new("GET", "/feed");
        request.headers.push(("x-stop".to_string(), "1".to_string()));
        let response = serve(&mux, "GET /feed", request);
        assert_eq!(response.status, 204);
        assert_eq!(response.text(), "handled");
        assert_eq!(response.header("content-type"), None);

        let response = serve(&mux, "GET /feed", Request::new("GET", "/feed"));
        assert_eq!(response.status, 200);
        assert!(response.text().contains("\"title\":\"hello\""));
    }

    #[test]
    fn test_status_precedence() {
        let mux = mux_with(RoutesConfig::default());

        // the result's own status beats the default
        let response = serve(&mux, "GET /checkout", Request::new("GET", "/checkout"));
        assert_eq!(response.status, 202);

        // a status set while rendering beats the result's
        let mut request = Request::new("GET", "/checkout");
        request.headers.push(("x-override".to_string(), "1".to_string()));
        let response = serve(&mux, "GET /checkout", request);
        assert_eq!(response.status, 299);

        // the error's status beats the result's
        let mut request = Request::new("GET", "/checkout");
        request.context = Context::new().with_value("fail", "1");
        let response = serve(&mux, "GET /checkout", request);
        assert_eq!(response.status, 402);
        assert_eq!(response.text(), "payment required");

        let response = serve(&mux, "GET /teapot", Request::new("GET", "/teapot"));
        assert_eq!(response.status, 418);
    }

    #[test]
    fn test_redirect_keeps_headers_set_while_rendering() {
        let mux = mux_with(RoutesConfig::default());
        let response = serve(&mux, "POST /login", form_post("/login", ""));
        assert_eq!(response.status, 303);
        assert_eq!(response.header("location"), Some("/"));
        assert_eq!(response.header("set-cookie"), Some("session=1"));
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_render_failure_is_logged_and_answers_500() {
        let logger = Arc::new(CaptureLogger::default());
        let config = RoutesConfig {
            path_prefix: String::new(),
            logger: Some(Arc::clone(&logger) as Arc<dyn Logger>),
        };
        let mux = mux_with(config);
        let response = serve(&mux, "GET /broken", Request::new("GET", "/broken"));
        assert_eq!(response.status, 500);
        assert_eq!(response.text(), "internal server error\n");
        let messages = logger.messages.lock().expect("logger lock");
        assert_eq!(messages.as_slice(), ["GET /broken: render failed: missing is not defined"]);
    }

    #[test]
    fn test_url_builders_escape_values() {
        let paths = route_paths("/app/");
        assert_eq!(paths.GetUser("42"), "/app/user/42");
        assert_eq!(paths.GetUser("a/b c"), "/app/user/a%2Fb%20c");
        assert_eq!(paths.Download("docs/q&a.txt"), "/app/files/docs/q%26a.txt");
        assert_eq!(paths.CreateUser(), "/app/user");
        assert_eq!(route_paths("").ReadTeapot(), "/teapot");
    }
}
