/// Scottish Parliament constituencies (2021 boundaries) and their council.
pub const CONSTITUENCY_COUNCILS: [(&str, &str); 73] = [
    ("Edinburgh Central", "City of Edinburgh"),
    ("Edinburgh Western", "City of Edinburgh"),
    ("Edinburgh Southern", "City of Edinburgh"),
    ("Edinburgh Pentlands", "City of Edinburgh"),
    ("Edinburgh Northern and Leith", "City of Edinburgh"),
    ("Edinburgh Eastern", "City of Edinburgh"),
    ("East Lothian", "East Lothian"),
    ("North East Fife", "Fife"),
    ("Dunfermline", "Fife"),
    ("Cowdenbeath", "Fife"),
    ("Kirkcaldy", "Fife"),
    ("Mid Fife and Glenrothes", "Fife"),
    ("Strathkelvin and Bearsden", "East Dunbartonshire"),
    ("Aberdeen Central", "Aberdeen City"),
    ("Aberdeen Donside", "Aberdeen City"),
    ("Aberdeen South and North Kincardine", "Aberdeen City"),
    ("Aberdeenshire West", "Aberdeenshire"),
    ("Aberdeenshire East", "Aberdeenshire"),
    ("Banffshire and Buchan Coast", "Aberdeenshire"),
    ("Glasgow Kelvin", "Glasgow City"),
    ("Glasgow Cathcart", "Glasgow City"),
    ("Glasgow Anniesland", "Glasgow City"),
    ("Glasgow Southside", "Glasgow City"),
    ("Glasgow Pollok", "Glasgow City"),
    ("Glasgow Maryhill and Springburn", "Glasgow City"),
    ("Glasgow Provan", "Glasgow City"),
    ("Glasgow Shettleston", "Glasgow City"),
    ("Rutherglen", "Glasgow City"),
    ("Perthshire North", "Perth and Kinross"),
    ("Perthshire South and Kinross-shire", "Perth and Kinross"),
    ("Stirling", "Stirling"),
    ("Inverness and Nairn", "Highland"),
    ("Caithness, Sutherland and Ross", "Highland"),
    ("Skye, Lochaber and Badenoch", "Highland"),
    ("Eastwood", "East Renfrewshire"),
    ("Ettrick, Roxburgh and Berwickshire", "Scottish Borders"),
    ("Midlothian South, Tweeddale and Lauderdale", "Scottish Borders"),
    ("Ayr", "South Ayrshire"),
    ("Carrick, Cumnock and Doon Valley", "South Ayrshire"),
    ("Argyll and Bute", "Argyll and Bute"),
    ("Midlothian North and Musselburgh", "Midlothian"),
    ("Linlithgow", "West Lothian"),
    ("Almond Valley", "West Lothian"),
    ("East Kilbride", "South Lanarkshire"),
    ("Clydesdale", "South Lanarkshire"),
    ("Hamilton, Larkhall and Stonehouse", "South Lanarkshire"),
    ("Uddingston and Bellshill", "South Lanarkshire"),
    ("Motherwell and Wishaw", "North Lanarkshire"),
    ("Airdrie and Shotts", "North Lanarkshire"),
    ("Coatbridge and Chryston", "North Lanarkshire"),
    ("Cumbernauld and Kilsyth", "North Lanarkshire"),
    ("Paisley", "Renfrewshire"),
    ("Renfrewshire North and West", "Renfrewshire"),
    ("Renfrewshire South", "Renfrewshire"),
    ("Greenock and Inverclyde", "Inverclyde"),
    ("Falkirk East", "Falkirk"),
    ("Falkirk West", "Falkirk"),
    ("Clackmannanshire and Dunblane", "Clackmannanshire"),
    ("Dumfriesshire", "Dumfries and Galloway"),
    ("Galloway and West Dumfries", "Dumfries and Galloway"),
    ("Dundee City East", "Dundee City"),
    ("Dundee City West", "Dundee City"),
    ("Angus North and Mearns", "Angus"),
    ("Angus South", "Angus"),
    ("Moray", "Moray"),
    ("Cunninghame North", "North Ayrshire"),
    ("Cunninghame South", "North Ayrshire"),
    ("Kilmarnock and Irvine Valley", "East Ayrshire"),
    ("Dumbarton", "West Dunbartonshire"),
    ("Clydebank and Milngavie", "West Dunbartonshire"),
    ("Na h-Eileanan an Iar", "Eilean Siar"),
    ("Orkney Islands", "Orkney Islands"),
    ("Shetland Islands", "Shetland Islands"),
];

/// Estimated £1m+ residential sales per council, 2024-25. Only the
/// distribution is used; the total is not the official sales count.
pub const COUNCIL_SALES: [(&str, f64); 32] = [
    ("City of Edinburgh", 200.0),
    ("East Lothian", 35.0),
    ("Fife", 30.0),
    ("East Dunbartonshire", 25.0),
    ("Aberdeen City", 20.0),
    ("Aberdeenshire", 15.0),
    ("Glasgow City", 15.0),
    ("Perth and Kinross", 12.0),
    ("Stirling", 10.0),
    ("Highland", 10.0),
    ("East Renfrewshire", 10.0),
    ("Scottish Borders", 8.0),
    ("South Ayrshire", 7.0),
    ("Argyll and Bute", 6.0),
    ("Midlothian", 5.0),
    ("West Lothian", 5.0),
    ("South Lanarkshire", 3.0),
    ("North Lanarkshire", 2.0),
    ("Renfrewshire", 2.0),
    ("Inverclyde", 1.0),
    ("Falkirk", 1.0),
    ("Clackmannanshire", 1.0),
    ("Dumfries and Galloway", 1.0),
    ("Dundee City", 1.0),
    ("Angus", 1.0),
    ("Moray", 1.0),
    ("North Ayrshire", 1.0),
    ("West Dunbartonshire", 1.0),
    ("East Ayrshire", 0.0),
    ("Eilean Siar", 0.0),
    ("Orkney Islands", 0.0),
    ("Shetland Islands", 0.0),
];
