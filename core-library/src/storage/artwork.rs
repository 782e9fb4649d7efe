//! Artwork lookups, image payloads and duplicate fixups.

use super::LibraryStorage;
use crate::error::Result;
use crate::models::{Artwork, ArtworkRemoteInfo, ImageStatus};
use tracing::debug;

/// Tables holding an `artwork_pk` reference.
const ARTWORK_OWNER_TABLES: &[&str] = &[
    "artists",
    "albums",
    "genres",
    "playables",
    "podcasts",
    "playlists",
    "directories",
];

impl LibraryStorage {
    /// Oldest artwork with the given remote identity.
    pub async fn get_artwork_by_remote_info(&mut self, info: &ArtworkRemoteInfo) -> Option<Artwork> {
        self.load_optional(
            sqlx::query_as::<_, Artwork>(
                "SELECT * FROM artwork_view WHERE remote_type = ? AND remote_id = ? ORDER BY pk LIMIT 1",
            )
            .bind(&info.remote_type)
            .bind(&info.id),
        )
        .await
    }

    /// Return the artwork with the given identity, creating it when absent.
    pub async fn get_or_create_artwork(&mut self, info: &ArtworkRemoteInfo, url: &str) -> Result<Artwork> {
        if let Some(mut artwork) = self.get_artwork_by_remote_info(info).await {
            if artwork.url != url {
                artwork.url = url.to_string();
                self.update(&artwork).await?;
            }
            return Ok(artwork);
        }

        let mut artwork: Artwork = self.create().await?;
        artwork.set_remote_info(info);
        artwork.url = url.to_string();
        self.update(&artwork).await?;
        Ok(artwork)
    }

    /// Artworks whose image was never fetched, oldest first.
    pub async fn get_artworks_that_are_not_checked(&mut self, limit: u32) -> Vec<Artwork> {
        self.load_all(
            sqlx::query_as::<_, Artwork>(
                "SELECT * FROM artwork_view WHERE status = ? ORDER BY pk LIMIT ?",
            )
            .bind(ImageStatus::NotChecked)
            .bind(i64::from(limit)),
        )
        .await
    }

    /// Store the image and mark the artwork checked, or missing when no
    /// image is given.
    pub async fn set_artwork_image(&mut self, artwork: &Artwork, image: Option<Vec<u8>>) -> Result<()> {
        let status = if image.is_some() {
            ImageStatus::Checked
        } else {
            ImageStatus::Missing
        };

        let conn = self.conn().await?;
        sqlx::query("UPDATE artworks SET image = ?, status = ? WHERE pk = ?")
            .bind(image)
            .bind(status)
            .bind(artwork.pk)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    pub async fn get_artwork_image(&mut self, artwork: &Artwork) -> Option<Vec<u8>> {
        self.scalar(
            "Artwork",
            sqlx::query_as::<_, (Option<Vec<u8>>,)>("SELECT image FROM artworks WHERE pk = ?")
                .bind(artwork.pk),
        )
        .await
        .flatten()
    }

    /// Point every owner of `duplicate` at `survivor`.
    pub async fn reassign_artwork_owners(&mut self, duplicate: &Artwork, survivor: &Artwork) -> Result<u64> {
        let conn = self.conn().await?;
        let mut reassigned = 0;
        for table in ARTWORK_OWNER_TABLES {
            reassigned += sqlx::query(&format!(
                "UPDATE {table} SET artwork_pk = ? WHERE artwork_pk = ?"
            ))
            .bind(survivor.pk)
            .bind(duplicate.pk)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        }

        debug!(
            duplicate = duplicate.pk,
            survivor = survivor.pk,
            reassigned,
            "Reassigned artwork owners"
        );
        Ok(reassigned)
    }

    /// Artworks sharing a remote identity, grouped as `(survivor, duplicates)`
    /// where the survivor is the oldest row.
    pub async fn get_duplicate_artworks(&mut self) -> Vec<(Artwork, Vec<Artwork>)> {
        let artworks = self
            .load_all(sqlx::query_as::<_, Artwork>(
                "SELECT a.* FROM artwork_view a
                 JOIN (
                     SELECT remote_type, remote_id FROM artworks
                     GROUP BY remote_type, remote_id HAVING COUNT(*) > 1
                 ) d ON d.remote_type = a.remote_type AND d.remote_id = a.remote_id
                 ORDER BY a.remote_type, a.remote_id, a.pk",
            ))
            .await;

        let mut groups: Vec<(Artwork, Vec<Artwork>)> = Vec::new();
        for artwork in artworks {
            match groups.last_mut() {
                Some((survivor, duplicates)) if survivor.remote_info() == artwork.remote_info() => {
                    duplicates.push(artwork);
                }
                _ => groups.push((artwork, Vec::new())),
            }
        }
        groups
    }
}
