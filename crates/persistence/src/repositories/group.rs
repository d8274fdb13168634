//! Group and membership repository.
//!
//! Every mutation that touches membership runs in one transaction and keeps
//! three things consistent: the member rows, the group's denormalized
//! `member_count`, and the affected user's `joined_group_ids` list.

use domain::models::role::GroupRole;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::warn;
use uuid::Uuid;

use crate::entities::{GroupEntity, GroupRoleDb, GroupWithRoleEntity, MemberEntity};
use crate::metrics::QueryTimer;

const GROUP_COLUMNS: &str =
    "id, name, description, is_public, member_count, created_by, created_at";
const MEMBER_COLUMNS: &str = "group_id, user_id, role, joined_at, display_name, avatar_url";

/// Result of a join attempt on a public group.
#[derive(Debug)]
pub enum JoinOutcome {
    Joined(MemberEntity),
    AlreadyMember,
    NotPublic,
    GroupMissing,
}

/// Result of a member departure (voluntary leave or removal).
#[derive(Debug)]
pub enum LeaveOutcome {
    Left,
    OwnershipTransferred { new_owner_id: Uuid },
    GroupDeleted,
    NotMember,
    GroupMissing,
}

/// Repository for group and membership operations.
#[derive(Clone)]
pub struct GroupRepository {
    pool: PgPool,
}

impl GroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a group with the creator as its owner.
    pub async fn create_group(
        &self,
        name: &str,
        description: Option<&str>,
        is_public: bool,
        created_by: Uuid,
    ) -> Result<GroupEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_group");
        let mut tx = self.pool.begin().await?;

        let group = sqlx::query_as::<_, GroupEntity>(&format!(
            r#"
            INSERT INTO groups (name, description, is_public, member_count, created_by)
            VALUES ($1, $2, $3, 1, $4)
            RETURNING {GROUP_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(description)
        .bind(is_public)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        insert_member(&mut tx, group.id, created_by, GroupRole::Owner).await?;
        append_joined_group(&mut tx, created_by, group.id).await?;

        tx.commit().await?;
        timer.record();
        Ok(group)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<GroupEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_group_by_id");
        let result = sqlx::query_as::<_, GroupEntity>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// All groups the user belongs to, with their role, most recent first.
    pub async fn find_user_groups(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<GroupWithRoleEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_groups");
        let result = sqlx::query_as::<_, GroupWithRoleEntity>(
            r#"
            SELECT g.id, g.name, g.description, g.is_public, g.member_count,
                   g.created_by, g.created_at, gm.role
            FROM groups g
            JOIN group_members gm ON gm.group_id = g.id
            WHERE gm.user_id = $1
            ORDER BY gm.joined_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Join a public group.
    pub async fn join_public_group(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<JoinOutcome, sqlx::Error> {
        let timer = QueryTimer::new("join_public_group");
        let mut tx = self.pool.begin().await?;

        let Some(group) = lock_group(&mut tx, group_id).await? else {
            timer.record();
            return Ok(JoinOutcome::GroupMissing);
        };
        if !group.is_public {
            timer.record();
            return Ok(JoinOutcome::NotPublic);
        }

        let already_member = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2)",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        if already_member {
            timer.record();
            return Ok(JoinOutcome::AlreadyMember);
        }

        let member = insert_member(&mut tx, group_id, user_id, GroupRole::Member).await?;
        bump_member_count(&mut tx, group_id, 1).await?;
        append_joined_group(&mut tx, user_id, group_id).await?;

        tx.commit().await?;
        timer.record();
        Ok(JoinOutcome::Joined(member))
    }

    /// Update group details; `None` fields are left untouched.
    pub async fn update_group(
        &self,
        group_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        is_public: Option<bool>,
    ) -> Result<Option<GroupEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_group");
        let result = sqlx::query_as::<_, GroupEntity>(&format!(
            r#"
            UPDATE groups
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                is_public = COALESCE($4, is_public)
            WHERE id = $1
            RETURNING {GROUP_COLUMNS}
            "#
        ))
        .bind(group_id)
        .bind(name)
        .bind(description)
        .bind(is_public)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn get_membership(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MemberEntity>, sqlx::Error> {
        let timer = QueryTimer::new("get_group_membership");
        let result = sqlx::query_as::<_, MemberEntity>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM group_members WHERE group_id = $1 AND user_id = $2"
        ))
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Change a member's role. The owner row is never touched here;
    /// ownership moves only through the leave path.
    pub async fn update_member_role(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        new_role: GroupRole,
    ) -> Result<Option<MemberEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_member_role");
        let role_db: GroupRoleDb = new_role.into();
        let result = sqlx::query_as::<_, MemberEntity>(&format!(
            r#"
            UPDATE group_members
            SET role = $3
            WHERE group_id = $1 AND user_id = $2 AND role <> 'owner'
            RETURNING {MEMBER_COLUMNS}
            "#
        ))
        .bind(group_id)
        .bind(user_id)
        .bind(role_db)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Remove a member (their own leave or a privileged removal).
    ///
    /// A departing owner hands the group to the earliest-joined admin,
    /// falling back to the earliest-joined member; a sole-member owner's
    /// departure deletes the group. After a `GroupDeleted` outcome the
    /// caller runs [`Self::scrub_joined_group_refs`] to clean remaining
    /// denormalized lists.
    pub async fn leave_or_remove(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<LeaveOutcome, sqlx::Error> {
        let timer = QueryTimer::new("leave_or_remove_member");
        let mut tx = self.pool.begin().await?;

        let Some(group) = lock_group(&mut tx, group_id).await? else {
            timer.record();
            return Ok(LeaveOutcome::GroupMissing);
        };

        let membership = sqlx::query_as::<_, MemberEntity>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM group_members WHERE group_id = $1 AND user_id = $2"
        ))
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(membership) = membership else {
            timer.record();
            return Ok(LeaveOutcome::NotMember);
        };

        let outcome = if membership.role == GroupRoleDb::Owner {
            if group.member_count <= 1 {
                delete_group_row(&mut tx, group_id).await?;
                remove_joined_group(&mut tx, user_id, group_id).await?;
                LeaveOutcome::GroupDeleted
            } else {
                match find_successor(&mut tx, group_id, user_id).await? {
                    Some(new_owner_id) => {
                        delete_member_row(&mut tx, group_id, user_id).await?;
                        promote_to_owner(&mut tx, group_id, new_owner_id).await?;
                        bump_member_count(&mut tx, group_id, -1).await?;
                        remove_joined_group(&mut tx, user_id, group_id).await?;
                        LeaveOutcome::OwnershipTransferred { new_owner_id }
                    }
                    None => {
                        // member_count disagrees with the member rows; the
                        // count invariant is broken, so take the group down
                        // rather than leave it ownerless.
                        warn!(
                            group_id = %group_id,
                            member_count = group.member_count,
                            "owner departure found no successor; deleting group"
                        );
                        delete_group_row(&mut tx, group_id).await?;
                        remove_joined_group(&mut tx, user_id, group_id).await?;
                        LeaveOutcome::GroupDeleted
                    }
                }
            }
        } else {
            delete_member_row(&mut tx, group_id, user_id).await?;
            let remaining = bump_member_count(&mut tx, group_id, -1).await?;
            remove_joined_group(&mut tx, user_id, group_id).await?;
            if remaining == 0 {
                delete_group_row(&mut tx, group_id).await?;
                LeaveOutcome::GroupDeleted
            } else {
                LeaveOutcome::Left
            }
        };

        tx.commit().await?;
        timer.record();
        Ok(outcome)
    }

    /// Delete a group outright. Member rows, invitations, links and
    /// per-group statuses go with it via cascading foreign keys; the caller
    /// follows up with [`Self::scrub_joined_group_refs`].
    pub async fn delete_group(&self, group_id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_group");
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(group_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    /// Remove a deleted group from every user's `joined_group_ids`, in
    /// bounded batches outside any transaction.
    pub async fn scrub_joined_group_refs(
        &self,
        group_id: Uuid,
        batch_size: i64,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("scrub_joined_group_refs");
        let mut total = 0u64;
        loop {
            let affected = sqlx::query(
                r#"
                UPDATE users
                SET joined_group_ids = array_remove(joined_group_ids, $1)
                WHERE id IN (
                    SELECT id FROM users WHERE $1 = ANY (joined_group_ids) LIMIT $2
                )
                "#,
            )
            .bind(group_id)
            .bind(batch_size)
            .execute(&self.pool)
            .await?
            .rows_affected();
            total += affected;
            if affected < batch_size as u64 {
                break;
            }
        }
        timer.record();
        Ok(total)
    }

    /// List members of a group, earliest joined first.
    pub async fn list_members(
        &self,
        group_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MemberEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_group_members");
        let result = sqlx::query_as::<_, MemberEntity>(&format!(
            r#"
            SELECT {MEMBER_COLUMNS}
            FROM group_members
            WHERE group_id = $1
            ORDER BY joined_at ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(group_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn count_members(&self, group_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_group_members");
        let result =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM group_members WHERE group_id = $1")
                .bind(group_id)
                .fetch_one(&self.pool)
                .await;
        timer.record();
        result
    }
}

/// Lock the group row for the duration of the transaction, serializing
/// concurrent membership mutations on the same group.
async fn lock_group(
    tx: &mut Transaction<'_, Postgres>,
    group_id: Uuid,
) -> Result<Option<GroupEntity>, sqlx::Error> {
    sqlx::query_as::<_, GroupEntity>(&format!(
        "SELECT {GROUP_COLUMNS} FROM groups WHERE id = $1 FOR UPDATE"
    ))
    .bind(group_id)
    .fetch_optional(&mut **tx)
    .await
}

/// Insert a member row, denormalizing display fields from the user record.
pub(crate) async fn insert_member(
    tx: &mut Transaction<'_, Postgres>,
    group_id: Uuid,
    user_id: Uuid,
    role: GroupRole,
) -> Result<MemberEntity, sqlx::Error> {
    let role_db: GroupRoleDb = role.into();
    sqlx::query_as::<_, MemberEntity>(&format!(
        r#"
        INSERT INTO group_members (group_id, user_id, role, display_name, avatar_url)
        SELECT $1, u.id, $3, u.display_name, u.avatar_url
        FROM users u
        WHERE u.id = $2
        RETURNING {MEMBER_COLUMNS}
        "#
    ))
    .bind(group_id)
    .bind(user_id)
    .bind(role_db)
    .fetch_one(&mut **tx)
    .await
}

/// Adjust `member_count` and return the new value.
pub(crate) async fn bump_member_count(
    tx: &mut Transaction<'_, Postgres>,
    group_id: Uuid,
    delta: i32,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        "UPDATE groups SET member_count = member_count + $2 WHERE id = $1 RETURNING member_count",
    )
    .bind(group_id)
    .bind(delta)
    .fetch_one(&mut **tx)
    .await
}

pub(crate) async fn append_joined_group(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    group_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE users
        SET joined_group_ids = array_append(joined_group_ids, $2)
        WHERE id = $1 AND NOT ($2 = ANY (joined_group_ids))
        "#,
    )
    .bind(user_id)
    .bind(group_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn remove_joined_group(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    group_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET joined_group_ids = array_remove(joined_group_ids, $2) WHERE id = $1",
    )
    .bind(user_id)
    .bind(group_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn delete_member_row(
    tx: &mut Transaction<'_, Postgres>,
    group_id: Uuid,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
        .bind(group_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn delete_group_row(
    tx: &mut Transaction<'_, Postgres>,
    group_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM groups WHERE id = $1")
        .bind(group_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Pick the member who inherits ownership: the earliest-joined admin, then
/// the earliest-joined remaining member.
async fn find_successor(
    tx: &mut Transaction<'_, Postgres>,
    group_id: Uuid,
    departing: Uuid,
) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT user_id
        FROM group_members
        WHERE group_id = $1 AND user_id <> $2 AND role <> 'owner'
        ORDER BY (role = 'admin') DESC, joined_at ASC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(group_id)
    .bind(departing)
    .fetch_optional(&mut **tx)
    .await
}

/// Promote the successor. The departing owner's row must already be gone:
/// a partial unique index allows at most one owner row per group.
async fn promote_to_owner(
    tx: &mut Transaction<'_, Postgres>,
    group_id: Uuid,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE group_members SET role = 'owner' WHERE group_id = $1 AND user_id = $2")
        .bind(group_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

