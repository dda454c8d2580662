use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Build a command running in `dir` with a clean lakestack environment
fn lakestack(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("lakestack").unwrap();
    cmd.current_dir(dir)
        .env_remove("LAKESTACK_FILE")
        .env_remove("LAKESTACK_OUT_DIR")
        .env_remove("LAKESTACK_LOG_DIR")
        .env_remove("CDK_DEFAULT_ACCOUNT")
        .env_remove("CDK_DEFAULT_REGION")
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "warn");
    cmd
}

/// Helper function to create a project initialized with the reference backend
fn create_project() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    lakestack(temp_dir.path()).arg("init").assert().success();
    temp_dir
}

#[test]
fn test_help_command() {
    let temp_dir = TempDir::new().unwrap();
    lakestack(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check-access"))
        .stdout(predicate::str::contains("synth"));
}

#[test]
fn test_init_writes_declaration_and_function() {
    let temp_dir = TempDir::new().unwrap();
    lakestack(temp_dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("backend.yaml"));

    let root = temp_dir.path();
    let declaration = fs::read_to_string(root.join("backend.yaml")).unwrap();
    assert!(declaration.contains("myRestApi"));
    assert!(root.join("amplify/functions/lakeformation/index.py").is_file());
    assert!(root
        .join("amplify/functions/lakeformation/requirements.txt")
        .is_file());
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp_dir = create_project();
    lakestack(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    lakestack(temp_dir.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_validate_reports_wildcard_warnings() {
    let temp_dir = create_project();
    lakestack(temp_dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("/items/{proxy+}"))
        .stderr(predicate::str::contains("CognitoGroupPolicy"))
        .stderr(predicate::str::contains("lakeformationFunctionPolicy"));
}

#[test]
fn test_validate_json() {
    let temp_dir = create_project();
    let output = lakestack(temp_dir.path())
        .args(["validate", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["valid"], true);
    assert_eq!(summary["routes"].as_array().unwrap().len(), 6);
    assert_eq!(summary["warnings"].as_array().unwrap().len(), 3);
}

#[test]
fn test_validate_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    lakestack(temp_dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("Failed to load declaration"));
}

#[test]
fn test_validate_rejects_unauthenticated_route() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("open.yaml"),
        r#"name: open
environment:
  account: "111122223333"
  region: us-east-1
functions:
  - name: worker
    source: worker
api:
  name: openApi
  paths:
    - path: public
      methods:
        - method: GET
          function: worker
"#,
    )
    .unwrap();

    lakestack(temp_dir.path())
        .args(["--file", "open.yaml", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GET /public has no authorization"));
}

#[test]
fn test_synth_writes_template() {
    let temp_dir = create_project();
    lakestack(temp_dir.path())
        .arg("synth")
        .assert()
        .success()
        .stdout(predicate::str::contains("template.json"));

    let template = fs::read_to_string(temp_dir.path().join("cdk.out/template.json")).unwrap();
    assert!(template.contains("AWS::ApiGateway::RestApi"));
    assert!(template.contains("COGNITO_USER_POOLS"));
}

#[test]
fn test_synth_to_stdout_respects_out_dir_variable() {
    let temp_dir = create_project();
    let output = lakestack(temp_dir.path())
        .env("LAKESTACK_OUT_DIR", "build")
        .args(["synth", "--stdout"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let template: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        template["Resources"]["LakeformationFunction"]["Properties"]["Runtime"],
        "python3.12"
    );
    assert!(!temp_dir.path().join("build").exists());
}

#[test]
fn test_outputs_writes_client_configuration() {
    let temp_dir = create_project();
    lakestack(temp_dir.path())
        .args(["outputs", "--api-id", "a1b2c3d4e5"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "https://a1b2c3d4e5.execute-api.ap-northeast-1.amazonaws.com/dev/",
        ));

    let outputs: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(temp_dir.path().join("cdk.out/amplify_outputs.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(outputs["custom"]["API"]["myRestApi"]["apiName"], "myRestApi");
    assert_eq!(outputs["custom"]["API"]["myRestApi"]["region"], "ap-northeast-1");
}

#[test]
fn test_plan_before_and_after_synth() {
    let temp_dir = create_project();
    lakestack(temp_dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("+ add MyRestApi (AWS::ApiGateway::RestApi)"));

    lakestack(temp_dir.path()).arg("synth").assert().success();
    lakestack(temp_dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes"));
}

#[test]
fn test_plan_fails_on_breaking_changes() {
    let temp_dir = create_project();
    lakestack(temp_dir.path()).arg("synth").assert().success();

    let path = temp_dir.path().join("backend.yaml");
    let declaration = fs::read_to_string(&path).unwrap();
    fs::write(&path, declaration.replace("stage: dev", "stage: prod")).unwrap();

    lakestack(temp_dir.path())
        .args(["plan", "--fail-on-breaking"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("remove MyRestApiDeploymentStageDev"))
        .stderr(predicate::str::contains("breaking"));
}

#[test]
fn test_check_access_routes() {
    let temp_dir = create_project();
    lakestack(temp_dir.path())
        .args(["check-access", "GET", "/items", "--as", "authenticated"])
        .assert()
        .success()
        .stdout(predicate::str::contains("allowed (invokes lakeformation)"));

    lakestack(temp_dir.path())
        .args(["check-access", "DELETE", "/items/42", "--as", "unauthenticated"])
        .assert()
        .success();

    lakestack(temp_dir.path())
        .args(["check-access", "GET", "/items"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Unauthorized"));

    lakestack(temp_dir.path())
        .args(["check-access", "GET", "/items", "--as", "group:test1"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Forbidden"));
}

#[test]
fn test_check_access_directory_token() {
    let temp_dir = create_project();
    lakestack(temp_dir.path())
        .args(["check-access", "GET", "/cognito-auth-path"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Unauthorized"));

    lakestack(temp_dir.path())
        .args([
            "check-access",
            "GET",
            "/cognito-auth-path",
            "--as",
            "token:amplifyAuth",
        ])
        .assert()
        .success();
}

#[test]
fn test_check_access_iam_actions() {
    let temp_dir = create_project();
    let workgroup = "arn:aws:athena:ap-northeast-1:123456789012:workgroup/primary";
    lakestack(temp_dir.path())
        .args([
            "check-access",
            "--as",
            "group:test1",
            "--action",
            "athena:StartQueryExecution",
            "--resource",
            workgroup,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("group:test1 may athena:StartQueryExecution"));

    lakestack(temp_dir.path())
        .args([
            "check-access",
            "--as",
            "group:test1",
            "--action",
            "cognito-idp:AdminGetUser",
            "--resource",
            "*",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("may not"));
}

#[test]
fn test_package_missing_manifest() {
    let temp_dir = create_project();
    fs::remove_file(
        temp_dir
            .path()
            .join("amplify/functions/lakeformation/requirements.txt"),
    )
    .unwrap();

    lakestack(temp_dir.path())
        .arg("package")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Requirements manifest not found"));
}

#[test]
fn test_package_unknown_function() {
    let temp_dir = create_project();
    lakestack(temp_dir.path())
        .args(["package", "--function", "reports"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown function 'reports'"));
}

#[cfg(unix)]
#[test]
fn test_package_with_fake_interpreter() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = create_project();
    // Invoked as: <python> -m pip install -r <manifest> -t <out> ...
    let fake = temp_dir.path().join("fake-python");
    fs::write(&fake, "#!/bin/sh\necho installed > \"$7/dependency.py\"\n").unwrap();
    fs::set_permissions(&fake, fs::Permissions::from_mode(0o755)).unwrap();

    lakestack(temp_dir.path())
        .args(["package", "--python", fake.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bundled lakeformation"));

    let bundle = temp_dir.path().join("cdk.out/bundles/lakeformation");
    assert!(bundle.join("dependency.py").is_file());
    assert!(bundle.join("index.py").is_file());

    // Synthesis picks up the bundle digest as the code key.
    let output = lakestack(temp_dir.path())
        .args(["synth", "--stdout"])
        .output()
        .unwrap();
    let template: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let key = template["Resources"]["LakeformationFunction"]["Properties"]["Code"]["S3Key"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(key.len(), 64 + ".zip".len());
}
