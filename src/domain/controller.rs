use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::{
    core::{utils::timestamp, RestError, RestResult, Value},
    reflect::{ControllerDecl, RestObject},
    service::{Arguments, Controller},
    storage::Persistence,
};

use super::{
    pager::Pager,
    user::{User, UserFilter, UserStatus, UsersList, USERS_TABLE, USER_STATUS},
};

/// The `user` service.
pub struct UserController {
    store: Arc<dyn Persistence>,
    default_page_size: u32,
}

impl UserController {
    pub fn new(store: Arc<dyn Persistence>, default_page_size: u32) -> Self {
        Self {
            store,
            default_page_size,
        }
    }

    async fn add(&self, user: User) -> RestResult<User> {
        let mut values = user.changes();
        values
            .entry("status".to_string())
            .or_insert_with(|| UserStatus::Active.into());
        User::stamp(&mut values, true, timestamp());

        let row = self.store.insert(USERS_TABLE, values).await?;
        Ok(User::from_row(&row))
    }

    async fn update(&self, id: i64, user: User) -> RestResult<User> {
        let existing = self.get(id).await?;
        let mut values = user.changes();
        User::stamp(&mut values, false, timestamp());

        let row = self
            .store
            .update(USERS_TABLE, existing.id.unwrap_or(id), values)
            .await?;
        Ok(User::from_row(&row))
    }

    async fn delete(&self, id: i64) -> RestResult<()> {
        self.store.delete(USERS_TABLE, &User::id_filter(id)).await?;
        Ok(())
    }

    async fn get(&self, id: i64) -> RestResult<User> {
        let rows = self
            .store
            .select(USERS_TABLE, Some(&User::id_filter(id)), None)
            .await?;
        rows.first()
            .map(User::from_row)
            .ok_or_else(|| RestError::object_not_found(User::TYPE_NAME, id))
    }

    async fn search(&self, filter: UserFilter, pager: Pager) -> RestResult<UsersList> {
        let conditions = filter.conditions();
        let page_size = pager.page_size(self.default_page_size);
        let page_index = pager.page_index();
        debug!("Searching users, page {page_index} of size {page_size}");

        let rows = self
            .store
            .search(USERS_TABLE, &conditions, page_size, page_index, None)
            .await?;
        let mut list = UsersList::new(rows.iter().map(User::from_row).collect());

        // a full page may not be the last one
        if list.objects.len() == page_size as usize {
            list.total_count = self.store.count(USERS_TABLE, &conditions).await? as i64;
        }
        Ok(list)
    }
}

#[async_trait]
impl Controller for UserController {
    fn declare(decl: &mut ControllerDecl) {
        decl.class::<User>()
            .class::<UserFilter>()
            .class::<UsersList>()
            .class::<Pager>()
            .enumeration(&USER_STATUS);

        decl.action("add")
            .description("Adds a new user")
            .param("user", "User")
            .returns("User");
        decl.action("update")
            .description("Updates existing user")
            .param("id", "int")
            .describe("user id to update")
            .param("user", "User")
            .returns("User");
        decl.action("delete")
            .description("Deletes existing user")
            .param("id", "int")
            .describe("user id to delete");
        decl.action("get")
            .description("Fetches user")
            .param("id", "int")
            .describe("user id to get")
            .returns("User");
        decl.action("search")
            .description("Lists users according to filter")
            .param("filter", "UserFilter")
            .default_value(Value::Null)
            .param("pager", "Pager")
            .default_value(Value::Null)
            .returns("UsersList");
    }

    async fn invoke(&self, action: &str, args: Arguments) -> RestResult<Value> {
        match action {
            "add" => {
                let user = args.object::<User>("user")?.unwrap_or_default();
                self.add(user).await.map(|u| u.to_value())
            }
            "update" => {
                let user = args.object::<User>("user")?.unwrap_or_default();
                self.update(args.int("id")?, user).await.map(|u| u.to_value())
            }
            "delete" => self.delete(args.int("id")?).await.map(|_| Value::Null),
            "get" => self.get(args.int("id")?).await.map(|u| u.to_value()),
            "search" => {
                let filter = args.object::<UserFilter>("filter")?.unwrap_or_default();
                let pager = args.object::<Pager>("pager")?.unwrap_or_default();
                self.search(filter, pager).await.map(|list| list.to_value())
            }
            _ => Err(RestError::action_not_found("user", action)),
        }
    }
}
