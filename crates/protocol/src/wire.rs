//! Wire-Format fuer gate-Verbindungen
//!
//! Frame-basiertes Protokoll: Laenge(u32 big-endian) + Code(u16 big-endian)
//! + Nutzdaten.
//!
//! ## Frame-Format
//!
//! ```text
//! +--------+--------+--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE)                   | Code (u16 BE)   | Nutzdaten |
//! +--------+--------+--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge zaehlt alle Bytes nach dem Laengen-Feld (Code + Nutzdaten).
//! Der feste Kopf ist das Laengen-Feld, direkt danach steht der Code.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use gate_core::NachrichtenCode;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes (fester Kopf)
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Groesse des Code-Felds in Bytes
pub const CODE_FIELD_SIZE: usize = 2;

// ---------------------------------------------------------------------------
// Nachricht
// ---------------------------------------------------------------------------

/// Eine vollstaendig gelesene Nachricht
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nachricht {
    code: NachrichtenCode,
    nutzdaten: Bytes,
}

impl Nachricht {
    pub fn neu(code: NachrichtenCode, nutzdaten: impl Into<Bytes>) -> Self {
        Self {
            code,
            nutzdaten: nutzdaten.into(),
        }
    }

    /// Nachrichten-Code (waehlt den Handler aus)
    pub fn code(&self) -> NachrichtenCode {
        self.code
    }

    /// Nutzdaten hinter dem Code-Feld
    pub fn nutzdaten(&self) -> &Bytes {
        &self.nutzdaten
    }

    /// Anzahl der Bytes nach dem Laengen-Feld
    pub fn rahmen_laenge(&self) -> usize {
        CODE_FIELD_SIZE + self.nutzdaten.len()
    }
}

fn laenge_pruefen(laenge: usize, max_frame_size: usize) -> io::Result<()> {
    if laenge < CODE_FIELD_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Frame zu kurz: {laenge} Bytes (Minimum: {CODE_FIELD_SIZE} Bytes)"),
        ));
    }
    if laenge > max_frame_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Frame zu gross: {laenge} Bytes (Maximum: {max_frame_size} Bytes)"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer gate-Frames
///
/// Fuer Clients und Tests, die mit `tokio_util::codec::Framed` arbeiten.
/// Das Gateway selbst liest mit [`read_frame`] in den Lesepuffer der
/// Verbindung.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Nachricht;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        // Laenge lesen ohne den Buffer zu veraendern
        let laenge = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        laenge_pruefen(laenge, self.max_frame_size)?;

        let gesamt = LENGTH_FIELD_SIZE + laenge;
        if src.len() < gesamt {
            src.reserve(gesamt - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_FIELD_SIZE);
        let mut rahmen = src.split_to(laenge).freeze();
        let code = rahmen.get_u16();

        Ok(Some(Nachricht {
            code,
            nutzdaten: rahmen,
        }))
    }
}

impl Encoder<Nachricht> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Nachricht, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let laenge = item.rahmen_laenge();
        laenge_pruefen(laenge, self.max_frame_size)?;

        dst.reserve(LENGTH_FIELD_SIZE + laenge);
        dst.put_u32(laenge as u32);
        dst.put_u16(item.code);
        dst.put_slice(&item.nutzdaten);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Direktes async Lesen/Schreiben
// ---------------------------------------------------------------------------

/// Liest genau einen Frame aus `reader` in den Lesepuffer `puffer`
///
/// Der Puffer wird vorher geleert; die zurueckgegebene Nachricht teilt sich
/// den Speicher mit ihm.
///
/// # Fehler
/// - `UnexpectedEof` wenn die Gegenstelle vor Abschluss des Frames schliesst
/// - `InvalidData` bei zu kurzem oder zu grossem Frame
pub async fn read_frame<R>(
    reader: &mut R,
    puffer: &mut BytesMut,
    max_frame_size: usize,
) -> io::Result<Nachricht>
where
    R: AsyncRead + Unpin,
{
    puffer.clear();

    let mut len_buf = [0u8; LENGTH_FIELD_SIZE];
    reader.read_exact(&mut len_buf).await?;
    let laenge = u32::from_be_bytes(len_buf) as usize;
    laenge_pruefen(laenge, max_frame_size)?;

    puffer.resize(laenge, 0);
    reader.read_exact(&mut puffer[..]).await?;

    let mut rahmen = puffer.split().freeze();
    let code = rahmen.get_u16();

    Ok(Nachricht {
        code,
        nutzdaten: rahmen,
    })
}

/// Schreibt einen einzelnen Frame in `writer`
pub async fn write_frame<W>(
    writer: &mut W,
    nachricht: &Nachricht,
    max_frame_size: usize,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let laenge = nachricht.rahmen_laenge();
    laenge_pruefen(laenge, max_frame_size)?;

    let mut kopf = [0u8; LENGTH_FIELD_SIZE + CODE_FIELD_SIZE];
    kopf[..LENGTH_FIELD_SIZE].copy_from_slice(&(laenge as u32).to_be_bytes());
    kopf[LENGTH_FIELD_SIZE..].copy_from_slice(&nachricht.code.to_be_bytes());

    writer.write_all(&kopf).await?;
    writer.write_all(&nachricht.nutzdaten).await?;
    writer.flush().await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_frame_layout() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Nachricht::neu(0x0102, &b"abc"[..]), &mut buf)
            .unwrap();

        assert_eq!(&buf[..], &[0, 0, 0, 5, 0x01, 0x02, b'a', b'b', b'c']);
    }

    #[test]
    fn codec_unvollstaendiger_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Nachricht::neu(7, &b"hallo welt"[..]), &mut buf)
            .unwrap();

        let half = buf.len() / 2;
        let mut partial = buf.split_to(half);
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn codec_zu_wenig_bytes_fuer_laengenfeld() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x00][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn codec_ablehnung_zu_grosser_frame() {
        let mut codec = FrameCodec::with_max_size(100);
        let mut buf = BytesMut::new();
        buf.put_u32(200);
        buf.put_slice(&[b'x'; 200]);

        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn codec_ablehnung_frame_ohne_code() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_u32(1);
        buf.put_u8(9);

        let fehler = codec.decode(&mut buf).unwrap_err();
        assert_eq!(fehler.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn codec_mehrere_nachrichten_im_buffer() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        for code in 0..3u16 {
            codec.encode(Nachricht::neu(code, Bytes::new()), &mut buf).unwrap();
        }
        for code in 0..3u16 {
            let msg = codec.decode(&mut buf).unwrap().expect("Nachricht erwartet");
            assert_eq!(msg.code(), code);
            assert!(msg.nutzdaten().is_empty());
        }
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn read_frame_liest_code_und_nutzdaten() {
        let mut daten: Vec<u8> = Vec::new();
        write_frame(&mut daten, &Nachricht::neu(42, &b"ping"[..]), DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap();

        let mut cursor = io::Cursor::new(daten);
        let mut puffer = BytesMut::new();
        let msg = read_frame(&mut cursor, &mut puffer, DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap();

        assert_eq!(msg.code(), 42);
        assert_eq!(&msg.nutzdaten()[..], b"ping");
    }

    #[tokio::test]
    async fn read_frame_nacheinander_mit_selbem_puffer() {
        let mut daten: Vec<u8> = Vec::new();
        for code in [1u16, 2, 3] {
            write_frame(&mut daten, &Nachricht::neu(code, vec![code as u8; 3]), 64)
                .await
                .unwrap();
        }

        let mut cursor = io::Cursor::new(daten);
        let mut puffer = BytesMut::new();
        for code in [1u16, 2, 3] {
            let msg = read_frame(&mut cursor, &mut puffer, 64).await.unwrap();
            assert_eq!(msg.code(), code);
            assert_eq!(&msg.nutzdaten()[..], &[code as u8; 3]);
        }

        // Danach ist der Stream leer
        let fehler = read_frame(&mut cursor, &mut puffer, 64).await.unwrap_err();
        assert_eq!(fehler.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn read_frame_abgeschnittener_frame() {
        let mut daten: Vec<u8> = Vec::new();
        daten.extend_from_slice(&10u32.to_be_bytes());
        daten.extend_from_slice(&[0, 1, 2]);

        let mut cursor = io::Cursor::new(daten);
        let mut puffer = BytesMut::new();
        let fehler = read_frame(&mut cursor, &mut puffer, DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap_err();
        assert_eq!(fehler.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn write_frame_ablehnung_zu_grosse_nachricht() {
        let mut daten: Vec<u8> = Vec::new();
        let result = write_frame(&mut daten, &Nachricht::neu(1, vec![0u8; 16]), 8).await;
        assert!(result.is_err());
        assert!(daten.is_empty());
    }
}
