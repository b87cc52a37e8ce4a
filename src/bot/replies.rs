//! Fixed reply texts.

pub const PING_GROUP: &str = "Hai";
pub const PING_DIRECT: &str = "Oi";

pub const MEAL_DAY_RANGE: &str =
    "\u{26a0}\u{fe0f} Masukkan angka hari antara 0 (Senin) sampai 6 (Minggu).";
pub const MEAL_READ_FAILED: &str = "\u{26a0}\u{fe0f} Terjadi kesalahan saat mengambil menu.";

pub const SETMEAL_FORMAT: &str =
    "\u{26a0}\u{fe0f} Format salah. Contoh: !setmeal 0 \"nasi putih, nasi goreng\"";
pub const SETMEAL_DAY_RANGE: &str =
    "\u{26a0}\u{fe0f} Index harus antara 0 (Senin) sampai 5 (Sabtu).";
pub const SETMEAL_SAVE_FAILED: &str = "\u{26a0}\u{fe0f} Gagal menyimpan menu.";

pub const ASK_EMPTY: &str = "\u{26a0}\u{fe0f} Tolong masukkan pertanyaan.";
pub const ASK_FAILED: &str = "\u{26a0}\u{fe0f} Terjadi kesalahan saat menghubungi GPT.";
pub const ASK_EMPTY_ANSWER: &str = "\u{26a0}\u{fe0f} Jawaban kosong dari GPT.";

pub fn setmeal_saved(day: usize) -> String {
    format!("\u{2705} Menu untuk hari ke-{} berhasil disimpan.", day)
}

/// `Hai 👋 @628123...`
pub fn group_greeting(sender_user: &str) -> String {
    format!("Hai \u{1f44b} @{}", sender_user)
}
