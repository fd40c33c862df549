//! Song database operations

use super::SongRepository;
use crate::models::Song;
use crate::{Error, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// SQLite-backed song repository
#[derive(Clone)]
pub struct SqliteSongRepository {
    pool: SqlitePool,
}

impl SqliteSongRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SongRepository for SqliteSongRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<Song>> {
        let row = sqlx::query("SELECT * FROM songs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_song))
    }

    async fn update(&self, song: &Song) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE songs SET
                title = ?, artist_name = ?, genre = ?,
                vocals_stem_path = ?, music_stem_path = ?, mixed_audio_path = ?,
                lyrics = ?, lyrics_karaoke = ?, lyrics_sections = ?, lyrics_display = ?,
                karaoke_subtitle_path = ?,
                bpm = ?, musical_key = ?, tempo = ?, duration_seconds = ?, vocal_timing = ?,
                background_style = ?, spectrum_style = ?, spectrum_color = ?, spectrum_opacity = ?,
                brand_logo_path = ?, copyright_text = ?
            WHERE id = ?
            "#,
        )
        .bind(&song.title)
        .bind(&song.artist_name)
        .bind(&song.genre)
        .bind(&song.vocals_stem_path)
        .bind(&song.music_stem_path)
        .bind(&song.mixed_audio_path)
        .bind(&song.lyrics)
        .bind(&song.lyrics_karaoke)
        .bind(&song.lyrics_sections)
        .bind(&song.lyrics_display)
        .bind(&song.karaoke_subtitle_path)
        .bind(song.bpm)
        .bind(&song.key)
        .bind(&song.tempo)
        .bind(song.duration_seconds)
        .bind(&song.vocal_timing)
        .bind(&song.background_style)
        .bind(&song.spectrum_style)
        .bind(&song.spectrum_color)
        .bind(song.spectrum_opacity)
        .bind(&song.brand_logo_path)
        .bind(&song.copyright_text)
        .bind(song.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Song {} not found", song.id)));
        }
        Ok(())
    }

    async fn insert(&self, song: &Song) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO songs (
                title, artist_name, genre,
                vocals_stem_path, music_stem_path, mixed_audio_path,
                lyrics, lyrics_karaoke, lyrics_sections, lyrics_display, karaoke_subtitle_path,
                bpm, musical_key, tempo, duration_seconds, vocal_timing,
                background_style, spectrum_style, spectrum_color, spectrum_opacity,
                brand_logo_path, copyright_text
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&song.title)
        .bind(&song.artist_name)
        .bind(&song.genre)
        .bind(&song.vocals_stem_path)
        .bind(&song.music_stem_path)
        .bind(&song.mixed_audio_path)
        .bind(&song.lyrics)
        .bind(&song.lyrics_karaoke)
        .bind(&song.lyrics_sections)
        .bind(&song.lyrics_display)
        .bind(&song.karaoke_subtitle_path)
        .bind(song.bpm)
        .bind(&song.key)
        .bind(&song.tempo)
        .bind(song.duration_seconds)
        .bind(&song.vocal_timing)
        .bind(&song.background_style)
        .bind(&song.spectrum_style)
        .bind(&song.spectrum_color)
        .bind(song.spectrum_opacity)
        .bind(&song.brand_logo_path)
        .bind(&song.copyright_text)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }
}

fn row_to_song(row: &SqliteRow) -> Song {
    Song {
        id: row.get("id"),
        title: row.get("title"),
        artist_name: row.get("artist_name"),
        genre: row.get("genre"),
        vocals_stem_path: row.get("vocals_stem_path"),
        music_stem_path: row.get("music_stem_path"),
        mixed_audio_path: row.get("mixed_audio_path"),
        lyrics: row.get("lyrics"),
        lyrics_karaoke: row.get("lyrics_karaoke"),
        lyrics_sections: row.get("lyrics_sections"),
        lyrics_display: row.get("lyrics_display"),
        karaoke_subtitle_path: row.get("karaoke_subtitle_path"),
        bpm: row.get("bpm"),
        key: row.get("musical_key"),
        tempo: row.get("tempo"),
        duration_seconds: row.get("duration_seconds"),
        vocal_timing: row.get("vocal_timing"),
        background_style: row.get("background_style"),
        spectrum_style: row.get("spectrum_style"),
        spectrum_color: row.get("spectrum_color"),
        spectrum_opacity: row.get("spectrum_opacity"),
        brand_logo_path: row.get("brand_logo_path"),
        copyright_text: row.get("copyright_text"),
    }
}
