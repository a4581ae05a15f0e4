//! Queries for collections and their book memberships.

use estante_db::{fetch_page, Database, DbError, Id, Page, PageRequest, TOTAL_COLUMN};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::models::{Collection, CollectionDraft};

const SELECT_COLLECTION: &str = "SELECT colecao.id AS id, colecao.nome AS nome, \
     colecao.descricao AS descricao, \
     (SELECT json_group_array(livro_id ORDER BY posicao) FROM colecao_livros \
      WHERE colecao_livros.colecao_id = colecao.id) AS livros, \
     colecao.colecionador_id AS colecionador_id, usuario.username AS colecionador";

const FROM_COLLECTION: &str = " FROM colecao JOIN usuario ON usuario.id = colecao.colecionador_id";

fn not_found(id: Id) -> DbError {
    DbError::NotFound {
        table: "colecao",
        id,
    }
}

/// Collections in creation order, optionally only those called exactly `name`.
pub async fn list(
    db: &Database,
    name: Option<&str>,
    page: PageRequest,
) -> Result<Page<Collection>, DbError> {
    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_COLLECTION);
    qb.push(", ").push(TOTAL_COLUMN).push(FROM_COLLECTION);
    if let Some(name) = name {
        qb.push(" WHERE colecao.nome = ").push_bind(name.to_string());
    }
    qb.push(" ORDER BY colecao.id");
    fetch_page(qb, page, db.pool()).await
}

pub async fn find(db: &Database, id: Id) -> Result<Collection, DbError> {
    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_COLLECTION);
    qb.push(FROM_COLLECTION)
        .push(" WHERE colecao.id = ")
        .push_bind(id);
    qb.build_query_as::<Collection>()
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| not_found(id))
}

/// Owner of collection `id`; the object-level policy runs against this.
pub async fn owner_of(db: &Database, id: Id) -> Result<Id, DbError> {
    sqlx::query_scalar::<_, Id>("SELECT colecionador_id FROM colecao WHERE id = ?")
        .bind(id)
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| not_found(id))
}

async fn replace_books(
    conn: &mut SqliteConnection,
    id: Id,
    book_ids: &[Id],
) -> Result<(), DbError> {
    sqlx::query("DELETE FROM colecao_livros WHERE colecao_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    for (position, book_id) in book_ids.iter().enumerate() {
        sqlx::query("INSERT INTO colecao_livros (colecao_id, livro_id, posicao) VALUES (?, ?, ?)")
            .bind(id)
            .bind(book_id)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn insert(db: &Database, owner_id: Id, draft: &CollectionDraft) -> Result<Id, DbError> {
    let mut tx = db.pool().begin().await?;
    let id: Id = sqlx::query_scalar(
        "INSERT INTO colecao (nome, descricao, colecionador_id) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(&draft.name)
    .bind(&draft.description)
    .bind(owner_id)
    .fetch_one(&mut *tx)
    .await?;
    replace_books(&mut *tx, id, &draft.book_ids).await?;
    tx.commit().await?;
    Ok(id)
}

/// Overwrite every field. Only a row still owned by `owner_id` is touched.
pub async fn update(
    db: &Database,
    id: Id,
    owner_id: Id,
    draft: &CollectionDraft,
) -> Result<(), DbError> {
    let mut tx = db.pool().begin().await?;
    let done = sqlx::query(
        "UPDATE colecao SET nome = ?, descricao = ? WHERE id = ? AND colecionador_id = ?",
    )
    .bind(&draft.name)
    .bind(&draft.description)
    .bind(id)
    .bind(owner_id)
    .execute(&mut *tx)
    .await?;
    if done.rows_affected() == 0 {
        return Err(not_found(id));
    }
    replace_books(&mut *tx, id, &draft.book_ids).await?;
    tx.commit().await?;
    Ok(())
}

/// Memberships go with the collection.
pub async fn delete(db: &Database, id: Id, owner_id: Id) -> Result<(), DbError> {
    let done = sqlx::query("DELETE FROM colecao WHERE id = ? AND colecionador_id = ?")
        .bind(id)
        .bind(owner_id)
        .execute(db.pool())
        .await?;
    if done.rows_affected() == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::accounts::repo as accounts;
    use crate::modules::catalog::repo::{self as catalog, tests::draft};
    use time::macros::date;

    async fn fixture() -> (Database, Id, Vec<Id>) {
        let db = crate::modules::catalog::repo::tests::seeded().await;
        let (owner, _) = accounts::insert_user(&db, "user01", "$argon2id$stub").await.unwrap();
        let mut books = Vec::new();
        for title in ["Eu, Robô", "Fundação"] {
            books.push(
                catalog::insert_book(&db, &draft(title, date!(1951 - 01 - 01)))
                    .await
                    .unwrap(),
            );
        }
        (db, owner.id, books)
    }

    fn favourites(book_ids: Vec<Id>) -> CollectionDraft {
        CollectionDraft {
            name: "Favoritos".into(),
            description: String::new(),
            book_ids,
        }
    }

    #[tokio::test]
    async fn memberships_keep_their_order() {
        let (db, owner, books) = fixture().await;
        let id = insert(&db, owner, &favourites(vec![books[1], books[0]])).await.unwrap();

        let stored = find(&db, id).await.unwrap();
        assert_eq!(stored.book_ids.0, vec![books[1], books[0]]);
        assert_eq!(stored.owner, "user01");
        assert_eq!(owner_of(&db, id).await.unwrap(), owner);
    }

    #[tokio::test]
    async fn deleting_a_book_drops_memberships() {
        let (db, owner, books) = fixture().await;
        let id = insert(&db, owner, &favourites(books.clone())).await.unwrap();

        catalog::delete_book(&db, books[0]).await.unwrap();
        assert_eq!(find(&db, id).await.unwrap().book_ids.0, vec![books[1]]);
    }

    #[tokio::test]
    async fn writes_are_scoped_to_the_owner() {
        let (db, owner, books) = fixture().await;
        let id = insert(&db, owner, &favourites(books)).await.unwrap();

        let stranger = owner + 1;
        assert!(matches!(
            update(&db, id, stranger, &favourites(vec![])).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(delete(&db, id, stranger).await, Err(DbError::NotFound { .. })));

        update(&db, id, owner, &favourites(vec![])).await.unwrap();
        assert!(find(&db, id).await.unwrap().book_ids.is_empty());
        delete(&db, id, owner).await.unwrap();
        assert!(matches!(owner_of(&db, id).await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_filters_by_exact_name() {
        let (db, owner, _) = fixture().await;
        insert(&db, owner, &favourites(vec![])).await.unwrap();
        let mut other = favourites(vec![]);
        other.name = "Favoritos antigos".into();
        insert(&db, owner, &other).await.unwrap();

        let first = PageRequest::parse(None, 10).unwrap();
        assert_eq!(list(&db, None, first).await.unwrap().count, 2);
        assert_eq!(list(&db, Some("Favoritos"), first).await.unwrap().count, 1);
    }
}
