use std::sync::Arc;

use http::StatusCode;
use serde_json::{json, Value as JsonValue};

use pingrest::{
    domain::{UserController, USERS_SCHEMA, USERS_TABLE},
    gateway::{Gateway, GatewayRequest, GatewayResponse},
    serializer::{APPLICATION_JSON, APPLICATION_XML},
    service::ServiceRegistry,
    storage::{MemoryStore, Persistence, SqliteStore},
};

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn gateway() -> Gateway {
    init_log();
    let store = Arc::new(MemoryStore::with_tables([USERS_TABLE]));
    let mut services = ServiceRegistry::new();
    services
        .register("user", UserController::new(store, 500))
        .unwrap();
    Gateway::new(services)
}

async fn sqlite_gateway() -> Gateway {
    init_log();
    let store = SqliteStore::in_memory().await.unwrap();
    store.ensure_table(&USERS_SCHEMA).await.unwrap();
    let mut services = ServiceRegistry::new();
    services
        .register("user", UserController::new(Arc::new(store), 2))
        .unwrap();
    Gateway::new(services)
}

fn json_body(response: &GatewayResponse) -> JsonValue {
    assert_eq!(response.content_type, APPLICATION_JSON);
    serde_json::from_slice(&response.body).unwrap()
}

#[tokio::test]
async fn test_unknown_service() {
    let response = gateway()
        .handle(GatewayRequest::get("/service/widget/action/get/id/7"))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let body = json_body(&response);
    assert_eq!(body["error"]["code"], "SERVICE_NOT_FOUND");
    assert_eq!(body["error"]["parameters"], json!({"service": "widget"}));
    assert!(body.get("result").is_none());
}

#[tokio::test]
async fn test_single_action_round_trip() {
    let gateway = gateway();
    let response = gateway
        .handle(GatewayRequest::get(
            "/service/user/action/add/user:firstName/Ann/user:lastName/Lee%20Park",
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let added = json_body(&response)["result"].clone();
    assert_eq!(added["objectType"], "User");
    assert_eq!(added["id"], 1);
    assert_eq!(added["lastName"], "Lee Park");
    assert_eq!(added["status"], 0);

    let response = gateway
        .handle(GatewayRequest::get("/service/user/action/get/id/1?ignored=yes"))
        .await;
    assert_eq!(json_body(&response)["result"], added);
}

#[tokio::test]
async fn test_body_params() {
    let gateway = gateway();
    let response = gateway
        .handle(GatewayRequest::post_json(
            "/service/user/action/add/user:lastName/Lee",
            r#"{"user": {"firstName": "Ann"}}"#,
        ))
        .await;
    let added = &json_body(&response)["result"];
    assert_eq!(added["firstName"], "Ann");
    assert_eq!(added["lastName"], "Lee");
}

#[tokio::test]
async fn test_batch_token_substitution() {
    let response = gateway()
        .handle(GatewayRequest::get(
            "/service/multirequest\
             /1:service/user/1:action/add/1:user:firstName/Ann\
             /2:service/user/2:action/add/2:user:firstName/%7Bresults:1:firstName%7D\
             /3:service/user/3:action/get/3:id/{results:2:id}",
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let responses = json_body(&response)["result"].as_array().unwrap().clone();
    assert_eq!(responses.len(), 3);
    for response in &responses {
        assert_eq!(response["objectType"], "RestResponse");
    }
    assert_eq!(responses[0]["result"]["firstName"], "Ann");
    assert_eq!(responses[1]["result"]["firstName"], "Ann");
    assert_eq!(responses[1]["result"]["id"], 2);
    assert_eq!(responses[2]["result"]["id"], 2);
}

#[tokio::test]
async fn test_batch_failure_is_isolated() {
    let response = gateway()
        .handle(GatewayRequest::get(
            "/service/multirequest\
             /1:service/user/1:action/get/1:id/42\
             /2:service/user/2:action/get/2:id/{results:1:id}\
             /3:service/user/3:action/add/3:user:firstName/Bo",
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let responses = json_body(&response)["result"].clone();
    assert_eq!(responses[0]["error"]["code"], "OBJECT_NOT_FOUND");
    assert_eq!(
        responses[0]["error"]["parameters"],
        json!({"type": "User", "id": 42})
    );
    assert_eq!(responses[1]["error"]["code"], "INVALID_MULTIREQUEST_TOKEN");
    assert_eq!(responses[2]["result"]["firstName"], "Bo");
}

#[tokio::test]
async fn test_batch_entry_without_action() {
    let response = gateway()
        .handle(GatewayRequest::get("/service/multirequest/1:service/user"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = json_body(&response);
    assert_eq!(body["error"]["code"], "ACTION_NOT_DEFINED");
    assert_eq!(body["error"]["parameters"], json!({"request": "1"}));
}

#[tokio::test]
async fn test_request_errors() {
    let gateway = gateway();
    let cases = [
        ("/nothing/here", StatusCode::BAD_REQUEST, "INVALID_URL"),
        ("/service/user/action/fly", StatusCode::NOT_FOUND, "ACTION_NOT_FOUND"),
        ("/service/user/action/get", StatusCode::BAD_REQUEST, "MISSING_PARAMETER"),
        ("/service/user/action/get/id/abc", StatusCode::BAD_REQUEST, "INVALID_PARAMETER"),
        ("/service/user/action/get/id/3", StatusCode::NOT_FOUND, "OBJECT_NOT_FOUND"),
    ];
    for (path, status, code) in cases {
        let response = gateway.handle(GatewayRequest::get(path)).await;
        assert_eq!(response.status, status, "{path}");
        assert_eq!(json_body(&response)["error"]["code"], code, "{path}");
    }
}

#[tokio::test]
async fn test_xml_output() {
    let gateway = gateway();
    let response = gateway
        .handle(
            GatewayRequest::get("/service/user/action/add/user:firstName/Ann")
                .with_accept("application/xml"),
        )
        .await;
    assert_eq!(response.content_type, APPLICATION_XML);
    let text = response.text();
    assert!(text.starts_with("<xml><result><objectType>User</objectType><id>1</id>"));
    assert!(text.contains("<firstName>Ann</firstName>"));
    assert!(!text.contains("lastName"));

    let response = gateway
        .handle(GatewayRequest::get("/service/user/action/get/id/9").with_accept("application/xml"))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response
        .text()
        .starts_with("<xml><error><code>OBJECT_NOT_FOUND</code>"));
}

#[tokio::test]
async fn test_schema_ignores_accept() {
    let response = gateway()
        .handle(GatewayRequest::get("/").with_accept(APPLICATION_JSON))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.content_type, APPLICATION_XML);

    let text = response.text();
    assert!(text.starts_with("<xml><enums>"));
    assert!(text.contains(
        r#"<enum name="UserStatus" type="int"><const name="ACTIVE" value="0"/><const name="DISABLED" value="1"/></enum>"#
    ));
    assert_eq!(text.matches(r#"<class name="User">"#).count(), 1);
    assert!(text.contains(r#"<class name="Pager">"#));
    assert!(text.contains(r#"<service id="user" name="user">"#));
    assert!(text.contains(r#"<property name="status" type="int" enumType="UserStatus"/>"#));
    assert!(text.contains(
        r#"<action name="get" enableInMultiRequest="true" description="Fetches user"><param name="id" type="int" description="user id to get"/><result type="User"/></action>"#
    ));
}

#[tokio::test]
async fn test_sqlite_backend() {
    let gateway = sqlite_gateway().await;
    for name in ["Ann", "Bo", "O'Hara"] {
        let response = gateway
            .handle(GatewayRequest::get(&format!(
                "/service/user/action/add/user:firstName/{name}"
            )))
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let response = gateway
        .handle(GatewayRequest::get("/service/user/action/get/id/3"))
        .await;
    let user = json_body(&response)["result"].clone();
    assert_eq!(user["firstName"], "O'Hara");
    assert_eq!(user["status"], 0);
    assert!(user.get("lastName").is_none());

    let response = gateway
        .handle(GatewayRequest::get(
            "/service/user/action/update/id/3/user:lastName/Lee",
        ))
        .await;
    assert_eq!(json_body(&response)["result"]["lastName"], "Lee");

    let response = gateway
        .handle(GatewayRequest::get("/service/user/action/search"))
        .await;
    let list = json_body(&response)["result"].clone();
    assert_eq!(list["totalCount"], 3);
    assert_eq!(list["objects"].as_array().unwrap().len(), 2);

    gateway
        .handle(GatewayRequest::get("/service/user/action/delete/id/1"))
        .await;
    let response = gateway
        .handle(GatewayRequest::get("/service/user/action/get/id/1"))
        .await;
    assert_eq!(json_body(&response)["error"]["code"], "OBJECT_NOT_FOUND");
}
