use std::io::Write;

use reqwest::{Method, Url};

use crate::cli::{RolesChangeArgs, RolesShowArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::models::{Role, RoleIds, RoleList};
use crate::output::Renderer;
use crate::pagination::{MAX_ITEMS, MAX_PAGE_SIZE, Page, fetch_all, validate_budget};
use crate::prompt::input_blocking;
use crate::reconcile::{ROLES, options_to_add, options_to_remove, parse_selection_label, pick};

#[derive(Debug, Clone, Copy)]
enum RoleChange {
    Assign,
    Remove,
}

impl RoleChange {
    const fn method(self) -> Method {
        match self {
            Self::Assign => Method::POST,
            Self::Remove => Method::DELETE,
        }
    }

    const fn verb(self) -> &'static str {
        match self {
            Self::Assign => "assign",
            Self::Remove => "remove",
        }
    }

    const fn past_tense(self) -> &'static str {
        match self {
            Self::Assign => "assigned",
            Self::Remove => "removed",
        }
    }
}

pub(crate) async fn handle_roles_show<W: Write>(
    ctx: &AppContext,
    args: RolesShowArgs,
    renderer: &mut Renderer<W>,
) -> CliResult<()> {
    let user_id = resolve_user_id(ctx, args.user_id).await?;
    let budget = validate_budget(args.number)?;

    let roles = fetch_user_roles(ctx, &user_id, budget)
        .await
        .map_err(|err| err.context(format!("failed to find roles for user with ID {user_id}")))?;
    renderer.render_roles(&roles, ctx.output)
}

pub(crate) async fn handle_roles_assign<W: Write>(
    ctx: &AppContext,
    args: RolesChangeArgs,
    renderer: &mut Renderer<W>,
) -> CliResult<()> {
    change_roles(ctx, args, RoleChange::Assign, renderer).await
}

pub(crate) async fn handle_roles_remove<W: Write>(
    ctx: &AppContext,
    args: RolesChangeArgs,
    renderer: &mut Renderer<W>,
) -> CliResult<()> {
    change_roles(ctx, args, RoleChange::Remove, renderer).await
}

async fn change_roles<W: Write>(
    ctx: &AppContext,
    args: RolesChangeArgs,
    change: RoleChange,
    renderer: &mut Renderer<W>,
) -> CliResult<()> {
    let user_id = resolve_user_id(ctx, args.user_id).await?;

    let role_ids = if args.roles.is_empty() {
        pick_roles(ctx, &user_id, change).await?
    } else {
        args.roles
            .iter()
            .map(|label| parse_selection_label(label))
            .collect::<CliResult<Vec<_>>>()?
    };

    ctx.send_json(
        change.method(),
        user_roles_url(ctx, &user_id)?,
        &RoleIds { roles: &role_ids },
    )
    .await
    .map_err(|err| {
        err.context(format!(
            "failed to {} roles for user with ID {user_id}",
            change.verb()
        ))
    })?;
    tracing::info!(user = %user_id, roles = ?role_ids, "{} roles", change.past_tense());

    let refreshed = match fetch_user_roles(ctx, &user_id, MAX_PAGE_SIZE).await {
        Ok(roles) => roles,
        Err(err) => {
            tracing::warn!(user = %user_id, "role list refresh failed after a successful change");
            return Err(err.context(format!(
                "roles were {} for user {user_id}, but refreshing the role list failed",
                change.past_tense()
            )));
        }
    };
    renderer.render_roles(&refreshed, ctx.output)
}

async fn pick_roles(ctx: &AppContext, user_id: &str, change: RoleChange) -> CliResult<Vec<String>> {
    let owner = format!("user with ID {user_id:?}");
    let current = fetch_user_roles(ctx, user_id, MAX_PAGE_SIZE)
        .await
        .map_err(|err| {
            err.context(format!(
                "failed to find the current roles for user with ID {user_id}"
            ))
        })?;

    let options = match change {
        RoleChange::Assign => {
            let universe = fetch_roles(ctx, ctx.endpoint("roles")?, MAX_ITEMS)
                .await
                .map_err(|err| err.context("failed to list all roles"))?;
            options_to_add(ROLES, &owner, &universe, &current)?
        }
        RoleChange::Remove => options_to_remove(ROLES, &owner, &current)?,
    };
    pick(&ctx.prompt, ROLES, options).await
}

async fn resolve_user_id(ctx: &AppContext, user_id: Option<String>) -> CliResult<String> {
    match user_id.map(|id| id.trim().to_string()) {
        Some(id) if !id.is_empty() => Ok(id),
        Some(_) => Err(CliError::validation("user ID must not be empty")),
        None => input_blocking(ctx.prompt.clone(), "User ID".to_string()).await,
    }
}

fn user_roles_url(ctx: &AppContext, user_id: &str) -> CliResult<Url> {
    if matches!(user_id, "." | "..") {
        return Err(CliError::validation(format!("invalid user ID given: {user_id}")));
    }
    ctx.endpoint(&format!("users/{}/roles", urlencoding::encode(user_id)))
}

async fn fetch_user_roles(ctx: &AppContext, user_id: &str, budget: usize) -> CliResult<Vec<Role>> {
    fetch_roles(ctx, user_roles_url(ctx, user_id)?, budget).await
}

async fn fetch_roles(ctx: &AppContext, endpoint: Url, budget: usize) -> CliResult<Vec<Role>> {
    fetch_all(budget, |options| {
        let mut url = endpoint.clone();
        url.query_pairs_mut().extend_pairs(options.query_pairs());
        async move { ctx.get_json::<RoleList>(url).await.map(Page::from) }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use httpmock::prelude::*;
    use serde_json::{Value, json};

    use crate::dispatch::tests::{CountingIndicator, context_for};
    use crate::output::OutputFormat;
    use crate::prompt::tests::ScriptedPrompt;
    use crate::reconcile::SelectionOption;

    const USER_ROLES: &str = "/api/v2/users/user_1/roles";

    fn role_page(roles: &[(&str, &str)]) -> Value {
        let roles: Vec<Value> = roles
            .iter()
            .map(|(id, name)| json!({"id": id, "name": name}))
            .collect();
        json!({"start": 0, "limit": 100, "length": roles.len(), "total": roles.len(), "roles": roles})
    }

    fn change_args(user_id: Option<&str>, roles: &[&str]) -> RolesChangeArgs {
        RolesChangeArgs {
            user_id: user_id.map(ToString::to_string),
            roles: roles.iter().map(ToString::to_string).collect(),
        }
    }

    fn output(renderer: Renderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).expect("utf-8 output")
    }

    #[test]
    fn user_ids_are_escaped_as_one_segment() -> CliResult<()> {
        let server = MockServer::start();
        let ctx = context_for(
            &server,
            Arc::new(CountingIndicator::default()),
            Arc::new(ScriptedPrompt::default()),
        );
        let url = user_roles_url(&ctx, "auth0|1")?;
        assert_eq!(url.path(), "/api/v2/users/auth0%7C1/roles");

        let url = user_roles_url(&ctx, "a/b")?;
        assert_eq!(url.path(), "/api/v2/users/a%2Fb/roles");

        assert!(user_roles_url(&ctx, "..").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn show_renders_roles_as_json() -> CliResult<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(USER_ROLES)
                .query_param("per_page", "5")
                .query_param("include_totals", "true");
            then.status(200).json_body(role_page(&[("rol_A", "Admin")]));
        });

        let mut ctx = context_for(
            &server,
            Arc::new(CountingIndicator::default()),
            Arc::new(ScriptedPrompt::default()),
        );
        ctx.output = OutputFormat::Json;
        let mut renderer = Renderer::new(Vec::new(), false);
        let args = RolesShowArgs {
            user_id: Some("user_1".to_string()),
            number: 5,
        };
        handle_roles_show(&ctx, args, &mut renderer).await?;

        mock.assert();
        assert_eq!(
            output(renderer),
            "[\n  {\n    \"id\": \"rol_A\",\n    \"name\": \"Admin\"\n  }\n]\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn show_prompts_for_missing_user_id() -> CliResult<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path(USER_ROLES);
            then.status(200).json_body(role_page(&[]));
        });

        let ctx = context_for(
            &server,
            Arc::new(CountingIndicator::default()),
            Arc::new(ScriptedPrompt::answering(" user_1 ")),
        );
        let mut renderer = Renderer::new(Vec::new(), false);
        let args = RolesShowArgs {
            user_id: None,
            number: 50,
        };
        handle_roles_show(&ctx, args, &mut renderer).await?;

        mock.assert();
        assert_eq!(output(renderer), "No roles found.\n");
        Ok(())
    }

    #[tokio::test]
    async fn assign_offers_only_unassigned_roles() -> CliResult<()> {
        let server = MockServer::start_async().await;
        let current = server.mock(|when, then| {
            when.method(GET).path(USER_ROLES).query_param("per_page", "100");
            then.status(200).json_body(role_page(&[("A", "Admin")]));
        });
        let universe = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v2/roles")
                .query_param("page", "0")
                .query_param("per_page", "100");
            then.status(200).json_body(role_page(&[
                ("A", "Admin"),
                ("B", "Billing"),
                ("C", "Compliance"),
            ]));
        });
        let assign = server.mock(|when, then| {
            when.method(POST)
                .path(USER_ROLES)
                .json_body(json!({"roles": ["C"]}));
            then.status(204);
        });

        let prompt = Arc::new(ScriptedPrompt::selecting(&["C"]));
        let ctx = context_for(
            &server,
            Arc::new(CountingIndicator::default()),
            Arc::clone(&prompt),
        );
        let mut renderer = Renderer::new(Vec::new(), false);
        handle_roles_assign(&ctx, change_args(Some("user_1"), &[]), &mut renderer).await?;

        universe.assert();
        assign.assert();
        // Once for the picker, once for the refresh.
        current.assert_calls(2);
        assert_eq!(
            prompt.presented(),
            vec![vec![
                SelectionOption::new("B", "Billing")?,
                SelectionOption::new("C", "Compliance")?,
            ]]
        );
        assert!(output(renderer).contains("Admin"));
        Ok(())
    }

    #[tokio::test]
    async fn assign_with_every_role_present_never_prompts() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(USER_ROLES);
            then.status(200).json_body(role_page(&[("A", "Admin")]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v2/roles");
            then.status(200).json_body(role_page(&[("A", "Admin")]));
        });

        let prompt = Arc::new(ScriptedPrompt::selecting(&["A"]));
        let ctx = context_for(
            &server,
            Arc::new(CountingIndicator::default()),
            Arc::clone(&prompt),
        );
        let mut renderer = Renderer::new(Vec::new(), false);
        let err = handle_roles_assign(&ctx, change_args(Some("user_1"), &[]), &mut renderer)
            .await
            .expect_err("nothing to assign");

        assert_eq!(
            err.display_message(),
            "the user with ID \"user_1\" has all roles assigned already"
        );
        assert!(prompt.presented().is_empty());
    }

    #[tokio::test]
    async fn assign_flag_skips_the_picker() -> CliResult<()> {
        let server = MockServer::start_async().await;
        let assign = server.mock(|when, then| {
            when.method(POST)
                .path(USER_ROLES)
                .json_body(json!({"roles": ["rol_1", "rol_2"]}));
            then.status(204);
        });
        server.mock(|when, then| {
            when.method(GET).path(USER_ROLES);
            then.status(200)
                .json_body(role_page(&[("rol_1", "Admin"), ("rol_2", "Reader")]));
        });

        let prompt = Arc::new(ScriptedPrompt::default());
        let ctx = context_for(
            &server,
            Arc::new(CountingIndicator::default()),
            Arc::clone(&prompt),
        );
        let mut renderer = Renderer::new(Vec::new(), false);
        let args = change_args(Some("user_1"), &["rol_1", "rol_2 (Name: Reader)"]);
        handle_roles_assign(&ctx, args, &mut renderer).await?;

        assign.assert();
        assert!(prompt.presented().is_empty());
        assert_eq!(output(renderer).lines().count(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn remove_with_empty_selection_aborts_before_mutation() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(USER_ROLES);
            then.status(200).json_body(role_page(&[("A", "Admin")]));
        });
        let remove = server.mock(|when, then| {
            when.method(DELETE).path(USER_ROLES);
            then.status(204);
        });

        let ctx = context_for(
            &server,
            Arc::new(CountingIndicator::default()),
            Arc::new(ScriptedPrompt::default()),
        );
        let mut renderer = Renderer::new(Vec::new(), false);
        let err = handle_roles_remove(&ctx, change_args(Some("user_1"), &[]), &mut renderer)
            .await
            .expect_err("no selection");

        assert!(matches!(err, CliError::Aborted(_)));
        assert_eq!(err.exit_code(), 1);
        remove.assert_calls(0);
    }

    #[tokio::test]
    async fn remove_without_assignments_is_a_validation_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(USER_ROLES);
            then.status(200).json_body(role_page(&[]));
        });

        let ctx = context_for(
            &server,
            Arc::new(CountingIndicator::default()),
            Arc::new(ScriptedPrompt::default()),
        );
        let mut renderer = Renderer::new(Vec::new(), false);
        let err = handle_roles_remove(&ctx, change_args(Some("user_1"), &[]), &mut renderer)
            .await
            .expect_err("nothing to remove");
        assert_eq!(
            err.display_message(),
            "the user with ID \"user_1\" has no roles assigned"
        );
    }

    #[tokio::test]
    async fn refresh_failure_mentions_the_completed_change() {
        let server = MockServer::start_async().await;
        let remove = server.mock(|when, then| {
            when.method(DELETE)
                .path(USER_ROLES)
                .json_body(json!({"roles": ["A"]}));
            then.status(204);
        });
        server.mock(|when, then| {
            when.method(GET).path(USER_ROLES);
            then.status(503).json_body(json!({"message": "Service Unavailable"}));
        });

        let ctx = context_for(
            &server,
            Arc::new(CountingIndicator::default()),
            Arc::new(ScriptedPrompt::default()),
        );
        let mut renderer = Renderer::new(Vec::new(), false);
        let err = handle_roles_remove(&ctx, change_args(Some("user_1"), &["A"]), &mut renderer)
            .await
            .expect_err("refresh fails");

        remove.assert();
        let message = err.display_message();
        assert!(message.starts_with(
            "roles were removed for user user_1, but refreshing the role list failed: "
        ));
        assert!(message.contains("Service Unavailable"));
        assert!(renderer.into_inner().is_empty());
    }

    #[tokio::test]
    async fn mutation_failure_is_classified() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path(USER_ROLES);
            then.status(400).json_body(json!({
                "statusCode": 400,
                "error": "Bad Request",
                "message": "Payload validation error",
                "errorCode": "invalid_body"
            }));
        });

        let ctx = context_for(
            &server,
            Arc::new(CountingIndicator::default()),
            Arc::new(ScriptedPrompt::default()),
        );
        let mut renderer = Renderer::new(Vec::new(), false);
        let err = handle_roles_assign(&ctx, change_args(Some("user_1"), &["bogus"]), &mut renderer)
            .await
            .expect_err("bad request");

        assert!(matches!(err, CliError::Validation(_)));
        assert_eq!(
            err.display_message(),
            "failed to assign roles for user with ID user_1: Payload validation error (invalid_body, status 400 Bad Request)"
        );
    }
}
